use serde::{Deserialize, Serialize};

use super::LineaInsumo;

pub const GASTO_CONSOLIDADO: &str = "Consolidado";
pub const GASTO_ANULADO: &str = "Anulado";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LineaCompra {
    pub articulo_id: i64,
    pub cantidad: f64,
    pub precio_unitario: f64,
}

/// Compra a proveedor
#[derive(Debug, Default, Serialize, Deserialize, Clone)]
pub struct NuevoGastoAdicional {
    pub numero_factura: String,
    pub proveedor_id: Option<i64>,
    pub fecha_gasto: String,
    pub descripcion: Option<String>,
    pub lineas: Vec<LineaCompra>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DetalleCompra {
    pub articulo_id: i64,
    pub articulo: String,
    pub cantidad: f64,
    pub precio_unitario: f64,
    pub subtotal: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GastoAdicional {
    pub id: i64,
    pub numero_factura: String,
    pub proveedor_id: i64,
    pub proveedor: String,
    pub fecha_gasto: String,
    pub descripcion: Option<String>,
    pub valor_total: f64,
    pub estado: String,
    pub usuario: String,
    pub detalles: Vec<DetalleCompra>,
}

#[derive(Debug, Default, Clone)]
pub struct FiltroGastos {
    pub busqueda: Option<String>,
    pub proveedor_id: Option<i64>,
    pub fecha_inicio: Option<String>,
    pub fecha_fin: Option<String>,
}

/// Consumo interno de insumos
#[derive(Debug, Default, Serialize, Deserialize, Clone)]
pub struct NuevoGastoAdministrativo {
    pub descripcion: String,
    pub lineas: Vec<LineaInsumo>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DetalleConsumo {
    pub articulo_id: i64,
    pub articulo: String,
    pub cantidad: f64,
    pub unidad: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GastoAdministrativo {
    pub id: i64,
    pub descripcion: String,
    pub estado: String,
    pub usuario: String,
    pub created_at: String,
    pub detalles: Vec<DetalleConsumo>,
}
