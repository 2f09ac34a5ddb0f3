use serde::{Deserialize, Serialize};

/// Formato de impresion de la factura
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatoFactura {
    Carta,
    Ticket,
}

impl FormatoFactura {
    pub fn desde_texto(valor: Option<&str>) -> FormatoFactura {
        match valor {
            Some("ticket") => FormatoFactura::Ticket,
            _ => FormatoFactura::Carta,
        }
    }
}

/// Factura con los datos necesarios para imprimirla
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Factura {
    pub id: i64,
    pub numero: String,
    pub actividad_id: String,
    pub fecha: String,
    pub cliente: String,
    pub cedula: String,
    pub telefono: String,
    pub email: Option<String>,
    pub personal: String,
    pub procedimiento: String,
    pub total: f64,
    pub pagos: Vec<(String, f64)>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct VerificacionFactura {
    pub existe: bool,
    pub actividad_id: String,
    pub numero: Option<String>,
}
