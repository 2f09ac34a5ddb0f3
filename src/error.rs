use std::sync::PoisonError;

use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{}", .0.join(". "))]
    Validacion(Vec<String>),

    #[error("No tiene permisos para realizar esta accion")]
    NoAutorizado,

    #[error("Debe iniciar sesion")]
    SesionRequerida,

    #[error("{0}")]
    NoEncontrado(String),

    #[error("{0}")]
    Conflicto(String),

    #[error("Token CSRF invalido")]
    Csrf,

    #[error("Error de base de datos: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("Error generando PDF: {0}")]
    Pdf(String),

    #[error("Error exportando: {0}")]
    Exportacion(String),

    #[error("Error en plantilla: {0}")]
    Plantilla(#[from] askama::Error),

    #[error("Error interno: recurso bloqueado")]
    Bloqueo,
}

impl AppError {
    /// Atajo para un unico mensaje de validacion
    pub fn validacion(mensaje: impl Into<String>) -> Self {
        AppError::Validacion(vec![mensaje.into()])
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validacion(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NoAutorizado | AppError::Csrf => StatusCode::FORBIDDEN,
            AppError::SesionRequerida => StatusCode::UNAUTHORIZED,
            AppError::NoEncontrado(_) => StatusCode::NOT_FOUND,
            AppError::Conflicto(_) => StatusCode::CONFLICT,
            AppError::Db(_)
            | AppError::Pdf(_)
            | AppError::Exportacion(_)
            | AppError::Plantilla(_)
            | AppError::Bloqueo => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl<T> From<PoisonError<T>> for AppError {
    fn from(_: PoisonError<T>) -> Self {
        AppError::Bloqueo
    }
}

impl From<csv::Error> for AppError {
    fn from(e: csv::Error) -> Self {
        AppError::Exportacion(e.to_string())
    }
}

/// Errores que impiden arrancar el servidor
#[derive(Error, Debug)]
pub enum ErrorArranque {
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error("No se pudo abrir la base de datos: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("Error de red: {0}")]
    Io(#[from] std::io::Error),
}

/// true si el error viene de una restriccion UNIQUE o FOREIGN KEY de SQLite
pub fn es_restriccion(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(f, _)
            if f.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

#[derive(Template)]
#[template(path = "error.html")]
struct ErrorVista {
    codigo: u16,
    mensaje: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::SesionRequerida = self {
            return Redirect::to("/auth/login").into_response();
        }

        let status = self.status();
        let mensaje = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, "request failed");
            "Hubo un error interno. Intente de nuevo.".to_string()
        } else {
            self.to_string()
        };

        let vista = ErrorVista {
            codigo: status.as_u16(),
            mensaje,
        };
        match vista.render() {
            Ok(html) => (status, Html(html)).into_response(),
            Err(_) => (status, vista.mensaje).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_por_variante() {
        assert_eq!(
            AppError::validacion("x").status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(AppError::NoAutorizado.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::Conflicto("ya existe".into()).status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_validacion_une_mensajes() {
        let e = AppError::Validacion(vec!["Uno".into(), "Dos".into()]);
        assert_eq!(e.to_string(), "Uno. Dos");
    }

    #[test]
    fn test_sesion_requerida_redirige() {
        let resp = AppError::SesionRequerida.into_response();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    }
}
