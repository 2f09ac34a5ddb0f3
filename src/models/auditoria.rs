use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RegistroAuditoria {
    pub id: i64,
    pub accion: String,
    pub tabla_afectada: String,
    pub registro_id: String,
    pub descripcion: String,
    pub usuario: String,
    pub fecha: String,
}

#[derive(Debug, Default, Clone)]
pub struct FiltroAuditoria {
    pub accion: Option<String>,
    pub usuario_id: Option<i64>,
    pub fecha_inicio: Option<String>,
    pub fecha_fin: Option<String>,
}

pub const ACCIONES: [&str; 4] = ["CREAR", "MODIFICAR", "ELIMINAR", "ANULAR"];
