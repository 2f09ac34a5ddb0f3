use serde::{Deserialize, Serialize};

/// Par id/nombre para selects
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ItemCatalogo {
    pub id: i64,
    pub nombre: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Personal {
    pub id: i64,
    pub nombre: String,
    pub apellidos: String,
    pub email: String,
    pub telefono: String,
    pub porcentaje_comision: f64,
    pub activo: bool,
}

impl Personal {
    pub fn nombre_completo(&self) -> String {
        format!("{} {}", self.nombre, self.apellidos)
    }
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
pub struct DatosPersonal {
    pub nombre: String,
    pub apellidos: String,
    pub email: String,
    pub prefijo: String,
    pub telefono: String,
    pub porcentaje_comision: Option<f64>,
    pub activo: bool,
}

/// Tipos de cliente
pub const TIPOS_CLIENTE: [&str; 3] = ["Spa", "Ropa", "Ambos"];

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Cliente {
    pub id: i64,
    pub nombre: String,
    pub apellidos: String,
    pub cedula: String,
    pub email: Option<String>,
    pub telefono: String,
    pub instagram: Option<String>,
    pub tipo: String,
    pub activo: bool,
}

impl Cliente {
    pub fn nombre_completo(&self) -> String {
        format!("{} {}", self.nombre, self.apellidos)
    }
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
pub struct DatosCliente {
    pub nombre: String,
    pub apellidos: String,
    pub cedula: String,
    pub email: Option<String>,
    pub prefijo: String,
    pub telefono: String,
    pub instagram: Option<String>,
    pub tipo: String,
    pub activo: bool,
}

pub const TIPOS_DOCUMENTO: [&str; 3] = ["NIT", "CC", "CE"];

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Proveedor {
    pub id: i64,
    pub tipo_documento: String,
    pub numero_documento: String,
    pub razon_social: String,
    pub email: Option<String>,
    pub telefono: Option<String>,
    pub direccion: Option<String>,
    pub activo: bool,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
pub struct DatosProveedor {
    pub tipo_documento: String,
    pub numero_documento: String,
    pub razon_social: String,
    pub email: Option<String>,
    pub telefono: Option<String>,
    pub direccion: Option<String>,
    pub activo: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Precio {
    pub id: i64,
    pub monto: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Procedimiento {
    pub id: i64,
    pub nombre: String,
    pub precio_id: Option<i64>,
    pub precio: Option<f64>,
    pub activo: bool,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
pub struct DatosProcedimiento {
    pub nombre: String,
    pub precio_id: Option<i64>,
    pub activo: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Banco {
    pub id: i64,
    pub nombre: String,
    pub activo: bool,
}
