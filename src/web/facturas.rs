use std::collections::HashMap;

use axum::extract::{Form, Path, Query, State};
use axum::response::Response;
use axum::Json;

use super::{descarga, Campos, Consulta};
use crate::commands::facturas;
use crate::error::AppError;
use crate::models::{Factura, FormatoFactura, SesionActiva, VerificacionFactura};
use crate::printing;
use crate::AppState;

fn pdf(state: &AppState, factura: &Factura, formato: Option<&str>) -> Result<Response, AppError> {
    let bytes = printing::factura_pdf(
        factura,
        FormatoFactura::desde_texto(formato),
        &state.config.negocio,
        &state.config.fonts_dir,
    )?;
    let archivo = format!("factura-{}.pdf", factura.numero);
    Ok(descarga(bytes, "application/pdf", &archivo, false))
}

pub async fn verificar(
    State(state): State<AppState>,
    _sesion: SesionActiva,
    Path(id): Path<String>,
) -> Result<Json<VerificacionFactura>, AppError> {
    Ok(Json(facturas::verificar_factura(&state.db, &id)?))
}

/// Numera la factura y devuelve el PDF en el formato pedido
pub async fn generar(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    Form(pares): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let campos = Campos::new(pares);
    campos.verificar_csrf(&sesion)?;
    let formato = campos.opcion("formato").or_else(|| Consulta::new(params).opcion("formato"));
    let factura = facturas::generar_factura(&state.db, &sesion, &id)?;
    pdf(&state, &factura, formato.as_deref())
}

pub async fn reimprimir(
    State(state): State<AppState>,
    _sesion: SesionActiva,
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let formato = Consulta::new(params).opcion("formato");
    let factura = facturas::obtener_factura(&state.db, &id)?;
    pdf(&state, &factura, formato.as_deref())
}
