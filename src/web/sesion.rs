//! Sesiones en memoria ligadas a la cookie `_token`.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::extract::FromRequestParts;
use axum::http::header::COOKIE;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use tracing::debug;

use crate::error::AppError;
use crate::models::SesionActiva;
use crate::utils;
use crate::AppState;

pub const COOKIE_SESION: &str = "_token";

pub struct Sesiones {
    activas: Mutex<HashMap<String, (SesionActiva, Instant)>>,
    duracion: Duration,
}

impl Sesiones {
    pub fn new(horas: i64) -> Self {
        Self {
            activas: Mutex::new(HashMap::new()),
            duracion: Duration::from_secs(horas.max(1) as u64 * 3600),
        }
    }

    /// Registra la sesion y devuelve el token de la cookie
    pub fn crear(&self, sesion: SesionActiva) -> Result<String, AppError> {
        let token = utils::generar_token();
        let mut activas = self.activas.lock()?;
        let ahora = Instant::now();
        activas.retain(|_, (_, vence)| *vence > ahora);
        activas.insert(token.clone(), (sesion, ahora + self.duracion));
        Ok(token)
    }

    pub fn obtener(&self, token: &str) -> Result<Option<SesionActiva>, AppError> {
        let mut activas = self.activas.lock()?;
        match activas.get(token) {
            Some((sesion, vence)) if *vence > Instant::now() => Ok(Some(sesion.clone())),
            Some(_) => {
                debug!("expired session removed");
                activas.remove(token);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    pub fn cerrar(&self, token: &str) -> Result<Option<SesionActiva>, AppError> {
        Ok(self.activas.lock()?.remove(token).map(|(sesion, _)| sesion))
    }

    pub fn segundos(&self) -> u64 {
        self.duracion.as_secs()
    }
}

/// Valor de la cookie `_token` en los encabezados
pub fn token_de(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|par| par.trim().split_once('='))
        .find(|(nombre, _)| *nombre == COOKIE_SESION)
        .map(|(_, valor)| valor.to_string())
}

pub fn cookie_sesion(token: &str, segundos: u64, segura: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        COOKIE_SESION, token, segundos
    );
    if segura {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn cookie_borrada() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", COOKIE_SESION)
}

#[axum::async_trait]
impl FromRequestParts<AppState> for SesionActiva {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = token_de(&parts.headers).ok_or(AppError::SesionRequerida)?;
        state
            .sesiones
            .obtener(&token)?
            .ok_or(AppError::SesionRequerida)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Rol;
    use axum::http::HeaderValue;

    fn sesion() -> SesionActiva {
        SesionActiva {
            usuario_id: 1,
            nombre: "ADMINISTRADOR".into(),
            username: "admin".into(),
            rol: Rol::Admin,
            csrf: "abc".into(),
        }
    }

    #[test]
    fn test_crear_obtener_cerrar() {
        let sesiones = Sesiones::new(1);
        let token = sesiones.crear(sesion()).unwrap();
        assert_eq!(sesiones.obtener(&token).unwrap().unwrap().username, "admin");
        assert!(sesiones.cerrar(&token).unwrap().is_some());
        assert!(sesiones.obtener(&token).unwrap().is_none());
    }

    #[test]
    fn test_token_entre_varias_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("tema=oscuro; _token=xyz; otro=1"));
        assert_eq!(token_de(&headers).as_deref(), Some("xyz"));
        assert_eq!(token_de(&HeaderMap::new()), None);
    }

    #[test]
    fn test_cookie_segura() {
        assert!(cookie_sesion("t", 60, true).ends_with("; Secure"));
        assert!(cookie_borrada().contains("Max-Age=0"));
    }
}
