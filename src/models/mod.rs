pub mod actividad;
pub mod auditoria;
pub mod caja;
pub mod catalogo;
pub mod factura;
pub mod gasto;
pub mod inventario;
pub mod reporte;
pub mod ropa;
pub mod usuario;

pub use actividad::*;
pub use auditoria::*;
pub use caja::*;
pub use catalogo::*;
pub use factura::*;
pub use gasto::*;
pub use inventario::*;
pub use reporte::*;
pub use ropa::*;
pub use usuario::*;

use serde::Serialize;

/// Una pagina de resultados
#[derive(Debug, Serialize, Clone)]
pub struct Pagina<T> {
    pub items: Vec<T>,
    pub pagina: i64,
    pub total_paginas: i64,
    pub total: i64,
}
