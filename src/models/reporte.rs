use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct GananciasPerdidas {
    pub fecha_inicio: String,
    pub fecha_fin: String,
    pub ingresos: f64,
    pub gastos_compras: f64,
    pub gastos_consumo: f64,
    pub total_gastos: f64,
    pub utilidad: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ClienteFrecuente {
    pub cliente_id: i64,
    pub cliente: String,
    pub visitas: i64,
    pub total_facturado: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VentaDiaria {
    pub fecha: String,
    pub etiqueta: String,
    pub total: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Dashboard {
    pub ventas_hoy: f64,
    pub clientes_atendidos: i64,
    pub servicios_hoy: i64,
    pub vales_hoy: f64,
    pub ultimos_dias: Vec<VentaDiaria>,
}
