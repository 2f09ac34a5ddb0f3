use serde::{Deserialize, Serialize};

use super::LineaInsumo;

pub const ESTADO_REALIZADA: &str = "Realizada";
pub const ESTADO_ANULADA: &str = "Anulada";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct NuevoPago {
    pub forma_pago_id: i64,
    pub banco_id: Option<i64>,
    pub monto: f64,
    pub referencia_pago: Option<String>,
}

/// Servicio (cliente + procedimiento + pagos) o vale (solo personal y monto)
#[derive(Debug, Default, Serialize, Deserialize, Clone)]
pub struct NuevaActividad {
    pub personal_id: Option<i64>,
    pub cliente_id: Option<i64>,
    pub procedimiento_id: Option<i64>,
    pub precio_id: Option<i64>,
    pub vales: f64,
    pub descripcion: Option<String>,
    pub pagos: Vec<NuevoPago>,
    pub insumos: Vec<LineaInsumo>,
}

impl NuevaActividad {
    pub fn es_vale(&self) -> bool {
        self.vales > 0.0
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PagoActividad {
    pub forma_pago: String,
    pub banco: Option<String>,
    pub monto: f64,
    pub referencia_pago: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Actividad {
    pub id: String,
    pub personal_id: i64,
    pub personal: String,
    pub cliente_id: Option<i64>,
    pub cliente: Option<String>,
    pub procedimiento: Option<String>,
    pub precio: Option<f64>,
    pub vales: f64,
    pub descripcion: Option<String>,
    pub estado: String,
    pub usuario: String,
    pub created_at: String,
    pub pagos: Vec<PagoActividad>,
    pub tiene_factura: bool,
}

impl Actividad {
    pub fn es_vale(&self) -> bool {
        self.vales > 0.0 && self.procedimiento.is_none()
    }

    pub fn anulada(&self) -> bool {
        self.estado == ESTADO_ANULADA
    }
}

/// Agrupacion por dia y personal de las actividades
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Ficha {
    pub fecha: String,
    pub personal_id: i64,
    pub personal: String,
    pub actividades: Vec<Actividad>,
    pub vales: Vec<Actividad>,
    pub total_actividades: f64,
    pub total_vales: f64,
}

#[derive(Debug, Default, Clone)]
pub struct FiltroActividades {
    pub buscar: Option<String>,
    pub personal_id: Option<i64>,
    pub cliente_id: Option<i64>,
    pub procedimiento_id: Option<i64>,
    pub fecha_inicio: Option<String>,
    pub fecha_fin: Option<String>,
}

/// Ganancia del personal en un rango de fechas
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PagoPersonal {
    pub personal_id: i64,
    pub personal: String,
    pub porcentaje: f64,
    pub servicios: i64,
    pub total_facturado: f64,
    pub ganancia: f64,
    pub vales: f64,
    pub neto: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct TotalesPagos {
    pub total_facturado: f64,
    pub ganancia: f64,
    pub vales: f64,
    pub neto: f64,
}

/// Linea del detalle exportable de pagos diarios
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServicioPagado {
    pub fecha: String,
    pub personal: String,
    pub procedimiento: String,
    pub monto: f64,
    pub parte_personal: f64,
    pub parte_negocio: f64,
}
