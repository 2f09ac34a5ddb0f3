use serde::{Deserialize, Serialize};

pub const CIERRE_CONSOLIDADO: &str = "Consolidado";
pub const CIERRE_ANULADO: &str = "Anulado";

/// Totales del dia calculados por el sistema
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct TotalesDia {
    pub fecha: String,
    pub total_efectivo: f64,
    pub total_datafono: f64,
    pub total_transferencia: f64,
    pub total_vales: f64,
    pub total_ventas_dia: f64,
    pub total_efectivo_sistema: f64,
    pub num_actividades: i64,
    pub num_vales: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CierreCaja {
    pub id: i64,
    pub fecha: String,
    pub total_efectivo: f64,
    pub total_datafono: f64,
    pub total_transferencia: f64,
    pub total_vales: f64,
    pub total_ventas_dia: f64,
    pub total_efectivo_sistema: f64,
    pub total_efectivo_contado: f64,
    pub descuadre: f64,
    pub desglose_efectivo: Option<serde_json::Value>,
    pub observaciones: Option<String>,
    pub estado: String,
    pub usuario: String,
    pub created_at: String,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
pub struct NuevoCierre {
    pub fecha: String,
    pub total_efectivo_contado: f64,
    /// Denominacion (en pesos) -> cantidad de billetes/monedas
    pub desglose: Option<Vec<(i64, i64)>>,
    pub observaciones: Option<String>,
}

/// Denominaciones de billetes y monedas en circulacion
pub const DENOMINACIONES: [i64; 11] = [
    100_000, 50_000, 20_000, 10_000, 5_000, 2_000, 1_000, 500, 200, 100, 50,
];
