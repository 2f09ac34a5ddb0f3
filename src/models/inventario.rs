use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Categoria {
    pub id: i64,
    pub nombre: String,
    pub descripcion: Option<String>,
    pub afecta_stock: bool,
    pub activo: bool,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
pub struct DatosCategoria {
    pub nombre: String,
    pub descripcion: Option<String>,
    pub afecta_stock: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UnidadMedida {
    pub id: i64,
    pub nombre: String,
    pub abreviatura: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Articulo {
    pub id: i64,
    pub nombre: String,
    pub descripcion: Option<String>,
    pub categoria_id: i64,
    pub categoria: String,
    pub unidad_medida_id: i64,
    pub unidad: String,
    pub stock_minimo: i64,
    pub stock_actual: f64,
    pub costo_unitario: f64,
    pub activo: bool,
}

impl Articulo {
    pub fn stock_bajo(&self) -> bool {
        self.stock_actual <= self.stock_minimo as f64
    }
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
pub struct DatosArticulo {
    pub nombre: String,
    pub descripcion: Option<String>,
    pub categoria_id: Option<i64>,
    pub unidad_medida_id: Option<i64>,
    pub stock_minimo: String,
    pub stock_actual: String,
    pub activo: bool,
}

#[derive(Debug, Default, Clone)]
pub struct FiltroArticulos {
    pub busqueda: Option<String>,
    pub categoria_id: Option<i64>,
}

/// Respuesta JSON del buscador de articulos
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ArticuloBusqueda {
    pub id: i64,
    pub nombre: String,
    pub descripcion: Option<String>,
    pub stock_actual: f64,
    pub unidad: String,
}

/// Linea de articulo/cantidad usada por actividades y consumos internos
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LineaInsumo {
    pub articulo_id: i64,
    pub cantidad: f64,
}
