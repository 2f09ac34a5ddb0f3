//! Capa HTTP: rutas, formularios y respuestas HTML.

mod actividades;
mod admin;
mod auth;
mod caja;
mod catalogos;
mod facturas;
mod gastos;
mod inventario;
mod reportes;
mod ropa;
pub mod sesion;
pub mod vistas;

use std::collections::HashMap;

use askama::Template;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::Router;

use crate::error::AppError;
use crate::models::SesionActiva;
use crate::AppState;

/// Filas en blanco que se ofrecen para lineas de detalle
pub const FILAS_EN_BLANCO: usize = 3;

pub fn crear_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(auth::inicio))
        .route("/dashboard", get(auth::dashboard))
        .route("/auth/login", get(auth::login_form).post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/perfil", get(auth::perfil))
        .route("/perfil/password", post(auth::cambiar_password))
        // Administracion
        .route("/admin/usuarios", get(admin::usuarios))
        .route("/admin/usuarios/nuevo", get(admin::nuevo_usuario).post(admin::crear_usuario))
        .route("/admin/usuarios/:id/editar", get(admin::editar_usuario).post(admin::actualizar_usuario))
        .route("/admin/usuarios/:id/eliminar", post(admin::eliminar_usuario))
        .route("/admin/auditoria", get(admin::auditoria))
        .route("/admin/bancos", get(admin::bancos))
        .route("/admin/bancos/nuevo", get(admin::nuevo_banco).post(admin::crear_banco))
        .route("/admin/bancos/:id/editar", get(admin::editar_banco).post(admin::actualizar_banco))
        .route("/admin/bancos/:id/eliminar", post(admin::eliminar_banco))
        // Catalogos
        .route("/personal", get(catalogos::personal))
        .route("/personal/nuevo", get(catalogos::nuevo_personal).post(catalogos::crear_personal))
        .route("/personal/:id/editar", get(catalogos::editar_personal).post(catalogos::actualizar_personal))
        .route("/personal/:id/eliminar", post(catalogos::eliminar_personal))
        .route("/clientes", get(catalogos::clientes))
        .route("/clientes/nuevo", get(catalogos::nuevo_cliente).post(catalogos::crear_cliente))
        .route("/clientes/:id/editar", get(catalogos::editar_cliente).post(catalogos::actualizar_cliente))
        .route("/clientes/:id/eliminar", post(catalogos::eliminar_cliente))
        .route("/proveedores", get(catalogos::proveedores))
        .route("/proveedores/nuevo", get(catalogos::nuevo_proveedor).post(catalogos::crear_proveedor))
        .route("/proveedores/:id/editar", get(catalogos::editar_proveedor).post(catalogos::actualizar_proveedor))
        .route("/proveedores/:id/eliminar", post(catalogos::eliminar_proveedor))
        .route("/procedimientos", get(catalogos::procedimientos))
        .route("/procedimientos/nuevo", get(catalogos::nuevo_procedimiento).post(catalogos::crear_procedimiento))
        .route("/procedimientos/:id/editar", get(catalogos::editar_procedimiento).post(catalogos::actualizar_procedimiento))
        .route("/procedimientos/:id/eliminar", post(catalogos::eliminar_procedimiento))
        .route("/precios", get(catalogos::precios))
        .route("/precios/nuevo", get(catalogos::nuevo_precio).post(catalogos::crear_precio))
        .route("/precios/:id/editar", get(catalogos::editar_precio).post(catalogos::actualizar_precio))
        .route("/precios/:id/eliminar", post(catalogos::eliminar_precio))
        // Inventario
        .route("/inventario/articulos", get(inventario::articulos))
        .route("/inventario/articulos/exportar", get(inventario::exportar))
        .route("/inventario/articulos/nuevo", get(inventario::nuevo_articulo).post(inventario::crear_articulo))
        .route("/inventario/articulos/:id/editar", get(inventario::editar_articulo).post(inventario::actualizar_articulo))
        .route("/inventario/articulos/:id/eliminar", post(inventario::eliminar_articulo))
        .route("/inventario/categorias", get(inventario::categorias))
        .route("/inventario/categorias/nueva", get(inventario::nueva_categoria).post(inventario::crear_categoria))
        .route("/api/articulos/buscar", get(inventario::buscar))
        // Actividades
        .route("/mis-actividades", get(actividades::fichas))
        .route("/actividades/nueva", get(actividades::nueva).post(actividades::crear))
        .route("/actividades/:id/anular", post(actividades::anular))
        .route("/actividades/:id/eliminar-vale", post(actividades::eliminar_vale))
        .route("/actividades/pagos", get(actividades::pagos))
        .route("/actividades/pagos/exportar", get(actividades::exportar_pagos))
        // Caja
        .route("/caja/cierre", get(caja::cierre).post(caja::guardar))
        .route("/caja/historial", get(caja::historial))
        .route("/caja/cierres/:id", get(caja::ver))
        .route("/caja/cierres/:id/anular", post(caja::anular))
        // Gastos
        .route("/gastos", get(gastos::compras))
        .route("/gastos/nuevo", get(gastos::nueva_compra).post(gastos::crear_compra))
        .route("/gastos/:id", get(gastos::ver_compra))
        .route("/gastos/:id/editar", get(gastos::editar_compra).post(gastos::actualizar_compra))
        .route("/gastos/:id/anular", post(gastos::anular_compra))
        .route("/gastos-administrativos", get(gastos::consumos))
        .route("/gastos-administrativos/nuevo", get(gastos::nuevo_consumo).post(gastos::crear_consumo))
        .route("/gastos-administrativos/:id", get(gastos::ver_consumo))
        .route("/gastos-administrativos/:id/editar", get(gastos::editar_consumo).post(gastos::actualizar_consumo))
        .route("/gastos-administrativos/:id/anular", post(gastos::anular_consumo))
        // Ropa
        .route("/ropa/articulos", get(ropa::articulos))
        .route("/ropa/articulos/nuevo", get(ropa::nuevo_articulo).post(ropa::crear_articulo))
        .route("/ropa/articulos/:id/editar", get(ropa::editar_articulo).post(ropa::actualizar_articulo))
        .route("/ropa/articulos/:id/eliminar", post(ropa::eliminar_articulo))
        .route("/ropa/ventas", get(ropa::ventas))
        .route("/ropa/ventas/nueva", get(ropa::nueva_venta).post(ropa::crear_venta))
        .route("/ropa/ventas/:id", get(ropa::ver_venta))
        .route("/ropa/ventas/:id/editar", get(ropa::editar_venta).post(ropa::actualizar_venta))
        .route("/ropa/ventas/:id/eliminar", post(ropa::eliminar_venta))
        // Facturas
        .route("/facturas/verificar/:id", get(facturas::verificar))
        .route("/facturas/generar/:id", post(facturas::generar))
        .route("/facturas/reimprimir/:id", get(facturas::reimprimir))
        // Reportes
        .route("/reportes/ganancias", get(reportes::ganancias))
        .route("/reportes/personal", get(reportes::personal))
        .route("/reportes/clientes-frecuentes", get(reportes::clientes_frecuentes))
        .with_state(state)
}

pub fn render<T: Template>(vista: &T) -> Result<Response, AppError> {
    Ok(Html(vista.render()?).into_response())
}

/// Formulario con errores de validacion
pub fn render_invalido<T: Template>(vista: &T) -> Result<Response, AppError> {
    Ok((StatusCode::UNPROCESSABLE_ENTITY, Html(vista.render()?)).into_response())
}

/// Redireccion con mensaje flash (`?msg=codigo`)
pub fn redirigir(url: &str, codigo: &str) -> Response {
    let separador = if url.contains('?') { '&' } else { '?' };
    Redirect::to(&format!("{}{}msg={}", url, separador, codigo)).into_response()
}

pub fn mensaje(codigo: Option<&str>) -> Option<String> {
    let texto = match codigo? {
        "creado" => "Registro creado correctamente",
        "actualizado" => "Registro actualizado correctamente",
        "eliminado" => "Registro eliminado correctamente",
        "anulado" => "Registro anulado correctamente",
        "password" => "Password actualizado correctamente",
        "cierre" => "Cierre de caja guardado correctamente",
        "sin_movimientos" => "No hay actividades ni vales registrados para la fecha indicada",
        "sesion_cerrada" => "Sesion cerrada",
        _ => return None,
    };
    Some(texto.to_string())
}

pub fn descarga(bytes: Vec<u8>, tipo: &'static str, archivo: &str, adjunto: bool) -> Response {
    let disposicion = format!(
        "{}; filename=\"{}\"",
        if adjunto { "attachment" } else { "inline" },
        archivo
    );
    (
        [
            (header::CONTENT_TYPE, tipo.to_string()),
            (header::CONTENT_DISPOSITION, disposicion),
        ],
        bytes,
    )
        .into_response()
}

/// Campos de un formulario en el orden en que llegaron
pub struct Campos(Vec<(String, String)>);

impl Campos {
    pub fn new(pares: Vec<(String, String)>) -> Self {
        Self(pares)
    }

    pub fn get(&self, clave: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == clave)
            .map(|(_, v)| v.as_str())
    }

    pub fn texto(&self, clave: &str) -> String {
        self.get(clave).unwrap_or_default().trim().to_string()
    }

    pub fn opcion(&self, clave: &str) -> Option<String> {
        crate::utils::limpiar(self.get(clave))
    }

    pub fn id(&self, clave: &str) -> Option<i64> {
        self.get(clave).and_then(|v| v.trim().parse().ok())
    }

    pub fn numero(&self, clave: &str) -> Option<f64> {
        self.get(clave).and_then(crate::utils::parse_numero)
    }

    /// Las casillas solo viajan cuando estan marcadas
    pub fn bool(&self, clave: &str) -> bool {
        matches!(self.get(clave), Some("on" | "1" | "true"))
    }

    pub fn todos(&self, clave: &str) -> Vec<&str> {
        self.0
            .iter()
            .filter(|(k, _)| k == clave)
            .map(|(_, v)| v.trim())
            .collect()
    }

    /// Lineas de detalle: valores repetidos de `claves` emparejados por posicion.
    /// Omite las filas que llegan completamente vacias.
    pub fn lineas(&self, claves: &[&str]) -> Vec<Vec<&str>> {
        let columnas: Vec<Vec<&str>> = claves.iter().map(|c| self.todos(c)).collect();
        let filas = columnas.iter().map(Vec::len).max().unwrap_or(0);
        (0..filas)
            .map(|i| {
                columnas
                    .iter()
                    .map(|c| c.get(i).copied().unwrap_or(""))
                    .collect::<Vec<_>>()
            })
            .filter(|fila| fila.iter().any(|v| !v.is_empty()))
            .collect()
    }

    pub fn verificar_csrf(&self, sesion: &SesionActiva) -> Result<(), AppError> {
        match self.get("_csrf") {
            Some(token) if token == sesion.csrf => Ok(()),
            _ => {
                tracing::warn!(usuario_id = sesion.usuario_id, "csrf token mismatch");
                Err(AppError::Csrf)
            }
        }
    }
}

/// Valores enviados de las lineas de detalle, para volver a mostrarlos
pub type FilasEnviadas = Vec<Vec<String>>;

pub fn filas_enviadas(campos: Option<&Campos>, claves: &[&str]) -> FilasEnviadas {
    campos
        .map(|f| {
            f.lineas(claves)
                .into_iter()
                .map(|fila| fila.into_iter().map(str::to_string).collect())
                .collect()
        })
        .unwrap_or_default()
}

/// Completa las filas enviadas con filas en blanco
pub fn rellenar(mut filas: FilasEnviadas, columnas: usize) -> FilasEnviadas {
    while filas.len() < FILAS_EN_BLANCO {
        filas.push(vec![String::new(); columnas]);
    }
    filas
}

pub fn id_de(valor: Option<&String>) -> Option<i64> {
    valor.and_then(|v| v.parse().ok())
}

/// Parametros de la query string
pub struct Consulta(HashMap<String, String>);

impl Consulta {
    pub fn new(params: HashMap<String, String>) -> Self {
        Self(params)
    }

    pub fn opcion(&self, clave: &str) -> Option<String> {
        crate::utils::limpiar(self.0.get(clave).map(String::as_str))
    }

    pub fn texto(&self, clave: &str) -> String {
        self.opcion(clave).unwrap_or_default()
    }

    pub fn id(&self, clave: &str) -> Option<i64> {
        self.opcion(clave).and_then(|v| v.parse().ok())
    }

    pub fn pagina(&self) -> i64 {
        self.id("pagina").unwrap_or(1)
    }

    pub fn mensaje(&self) -> Option<String> {
        mensaje(self.0.get("msg").map(String::as_str))
    }

    /// Filtros actuales codificados para los enlaces de paginacion
    pub fn codificada(&self, claves: &[&str]) -> String {
        let pares: Vec<(&str, String)> = claves
            .iter()
            .filter_map(|c| self.opcion(c).map(|v| (*c, v)))
            .collect();
        serde_urlencoded::to_string(pares).unwrap_or_default()
    }
}

/// Texto para celdas de valores opcionales
pub fn o_guion(valor: Option<&str>) -> String {
    valor.filter(|v| !v.is_empty()).unwrap_or("-").to_string()
}

pub fn si_no(valor: bool) -> String {
    if valor { "Si" } else { "No" }.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn campos(pares: &[(&str, &str)]) -> Campos {
        Campos::new(
            pares
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_lineas_por_posicion() {
        let c = campos(&[
            ("articulo_id", "4"),
            ("cantidad", "2"),
            ("articulo_id", ""),
            ("cantidad", ""),
            ("articulo_id", "9"),
            ("cantidad", "0.5"),
        ]);
        assert_eq!(
            c.lineas(&["articulo_id", "cantidad"]),
            vec![vec!["4", "2"], vec!["9", "0.5"]]
        );
    }

    #[test]
    fn test_casilla_y_numeros() {
        let c = campos(&[("activo", "on"), ("monto", " 1500.5 "), ("id", "x")]);
        assert!(c.bool("activo"));
        assert!(!c.bool("otro"));
        assert_eq!(c.numero("monto"), Some(1500.5));
        assert_eq!(c.id("id"), None);

        let c = campos(&[("a", "inf"), ("b", "NaN"), ("c", "-Infinity")]);
        assert_eq!(c.numero("a"), None);
        assert_eq!(c.numero("b"), None);
        assert_eq!(c.numero("c"), None);
    }

    #[test]
    fn test_consulta_codificada() {
        let mut params = HashMap::new();
        params.insert("busqueda".to_string(), "ana maria".to_string());
        params.insert("pagina".to_string(), "2".to_string());
        let consulta = Consulta::new(params);
        assert_eq!(consulta.codificada(&["busqueda", "categoria_id"]), "busqueda=ana+maria");
        assert_eq!(consulta.pagina(), 2);
    }

    #[test]
    fn test_redirigir_con_mensaje() {
        let resp = redirigir("/clientes", "creado");
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers()[header::LOCATION], "/clientes?msg=creado");
        assert!(mensaje(Some("desconocido")).is_none());
    }
}
