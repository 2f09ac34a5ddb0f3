use std::collections::HashMap;

use axum::extract::{Form, Query, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Redirect, Response};
use tracing::info;

use super::sesion::{cookie_borrada, cookie_sesion, token_de};
use super::vistas::{Accion, Bloque, Campo, FormularioVista, Layout, Linea, LoginVista, ResumenVista};
use super::{redirigir, render, render_invalido, Campos, Consulta};
use crate::commands::{dashboard, usuarios};
use crate::error::AppError;
use crate::models::{CambioPassword, SesionActiva};
use crate::utils::formatear_moneda;
use crate::AppState;

pub async fn inicio() -> Redirect {
    Redirect::to("/dashboard")
}

pub async fn dashboard(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let consulta = Consulta::new(params);
    let d = dashboard::resumen(&state.db)?;
    let vista = ResumenVista {
        layout: Layout::new(&sesion, consulta.mensaje()),
        titulo: "Inicio".to_string(),
        filtro_accion: String::new(),
        filtros: Vec::new(),
        bloques: vec![
            Bloque {
                titulo: "Hoy".to_string(),
                lineas: vec![
                    Linea::new("Ventas", formatear_moneda(d.ventas_hoy)),
                    Linea::new("Servicios", d.servicios_hoy.to_string()),
                    Linea::new("Clientes atendidos", d.clientes_atendidos.to_string()),
                    Linea::new("Vales", formatear_moneda(d.vales_hoy)),
                ],
            },
            Bloque {
                titulo: "Ventas de los ultimos 7 dias".to_string(),
                lineas: d
                    .ultimos_dias
                    .iter()
                    .map(|v| Linea::new(&v.etiqueta, formatear_moneda(v.total)))
                    .collect(),
            },
        ],
        botones: vec![
            Accion::enlace("Registrar actividad", "/actividades/nueva"),
            Accion::enlace("Cierre de caja", "/caja/cierre"),
        ],
    };
    render(&vista)
}

pub async fn login_form(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    if let Some(token) = token_de(&headers) {
        if state.sesiones.obtener(&token)?.is_some() {
            return Ok(Redirect::to("/mis-actividades").into_response());
        }
    }
    render(&LoginVista {
        username: String::new(),
        errores: Vec::new(),
        mensaje: Consulta::new(params).mensaje(),
    })
}

pub async fn login(
    State(state): State<AppState>,
    Form(pares): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let campos = Campos::new(pares);
    let username = campos.texto("username");
    let password = campos.get("password").unwrap_or_default();

    match usuarios::iniciar_sesion(&state.db, &username, password) {
        Ok(sesion) => {
            let token = state.sesiones.crear(sesion)?;
            let cookie = cookie_sesion(&token, state.sesiones.segundos(), state.config.cookie_secure);
            Ok(([(header::SET_COOKIE, cookie)], Redirect::to("/mis-actividades")).into_response())
        }
        Err(AppError::Validacion(errores)) => render_invalido(&LoginVista {
            username,
            errores,
            mensaje: None,
        }),
        Err(e) => Err(e),
    }
}

pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    sesion: SesionActiva,
    Form(pares): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    Campos::new(pares).verificar_csrf(&sesion)?;
    if let Some(token) = token_de(&headers) {
        state.sesiones.cerrar(&token)?;
    }
    info!(usuario_id = sesion.usuario_id, "session closed");
    Ok((
        [(header::SET_COOKIE, cookie_borrada())],
        redirigir("/auth/login", "sesion_cerrada"),
    )
        .into_response())
}

fn formulario_password(sesion: &SesionActiva, mensaje: Option<String>) -> FormularioVista {
    let mut vista = FormularioVista::new(
        Layout::new(sesion, mensaje),
        "Cambiar password",
        "/perfil/password",
        "/dashboard",
    );
    vista.resumen = vec![
        Linea::new("Nombre", sesion.nombre.clone()),
        Linea::new("Usuario", sesion.username.clone()),
        Linea::new("Rol", sesion.rol.nombre()),
    ];
    vista.campos = vec![
        Campo::texto("password_actual", "Password actual", "").con_tipo("password").requerido(),
        Campo::texto("password_nuevo", "Password nuevo", "").con_tipo("password").requerido(),
        Campo::texto("repetir_password", "Repetir password", "").con_tipo("password").requerido(),
    ];
    vista
}

pub async fn perfil(
    sesion: SesionActiva,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    render(&formulario_password(&sesion, Consulta::new(params).mensaje()))
}

pub async fn cambiar_password(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Form(pares): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let campos = Campos::new(pares);
    campos.verificar_csrf(&sesion)?;
    let datos = CambioPassword {
        password_actual: campos.get("password_actual").unwrap_or_default().to_string(),
        password_nuevo: campos.get("password_nuevo").unwrap_or_default().to_string(),
        repetir_password: campos.get("repetir_password").unwrap_or_default().to_string(),
    };
    match usuarios::cambiar_password(&state.db, &sesion, &datos) {
        Ok(()) => Ok(redirigir("/perfil", "password")),
        Err(AppError::Validacion(errores)) => {
            let mut vista = formulario_password(&sesion, None);
            vista.errores = errores;
            render_invalido(&vista)
        }
        Err(e) => Err(e),
    }
}
