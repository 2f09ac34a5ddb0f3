use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ArticuloRopa {
    pub id: i64,
    pub nombre: String,
    pub descripcion: Option<String>,
    pub marca: Option<String>,
    pub color: Option<String>,
    pub talla: Option<String>,
    pub stock_actual: i64,
    pub precio_compra: Option<f64>,
    pub precio_venta: f64,
    pub observacion: Option<String>,
    pub activo: bool,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
pub struct DatosArticuloRopa {
    pub nombre: String,
    pub descripcion: Option<String>,
    pub marca: Option<String>,
    pub color: Option<String>,
    pub talla: Option<String>,
    pub stock_actual: String,
    pub precio_compra: Option<String>,
    pub precio_venta: String,
    pub observacion: Option<String>,
    pub activo: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LineaVentaRopa {
    pub articulo_ropa_id: i64,
    pub cantidad: i64,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
pub struct NuevaVentaRopa {
    pub cliente_id: Option<i64>,
    pub lineas: Vec<LineaVentaRopa>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DetalleVentaRopa {
    pub articulo_ropa_id: i64,
    pub articulo: String,
    pub cantidad: i64,
    pub precio_unitario: f64,
    pub subtotal: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct VentaRopa {
    pub id: i64,
    pub cliente_id: Option<i64>,
    pub cliente: Option<String>,
    pub total: f64,
    pub usuario: String,
    pub created_at: String,
    pub detalles: Vec<DetalleVentaRopa>,
}

#[derive(Debug, Default, Clone)]
pub struct FiltroVentasRopa {
    pub busqueda: Option<String>,
    pub fecha_inicio: Option<String>,
    pub fecha_fin: Option<String>,
}
