use serde::{Deserialize, Serialize};

/// Roles de la aplicacion (tabla `roles`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rol {
    Admin,
    Empleado,
    Supervisor,
}

impl Rol {
    pub fn desde_nombre(nombre: &str) -> Option<Rol> {
        match nombre {
            "Admin" => Some(Rol::Admin),
            "Empleado" => Some(Rol::Empleado),
            "Supervisor" => Some(Rol::Supervisor),
            _ => None,
        }
    }

    pub fn nombre(&self) -> &'static str {
        match self {
            Rol::Admin => "Admin",
            Rol::Empleado => "Empleado",
            Rol::Supervisor => "Supervisor",
        }
    }
}

/// Info de usuario para listados (sin hash/salt)
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UsuarioInfo {
    pub id: i64,
    pub nombre: String,
    pub username: String,
    pub rol_id: i64,
    pub rol: String,
    pub activo: bool,
}

/// Sesion activa (almacenada en RAM, una por cookie)
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SesionActiva {
    pub usuario_id: i64,
    pub nombre: String,
    pub username: String,
    pub rol: Rol,
    /// Token que deben repetir los formularios POST
    pub csrf: String,
}

impl SesionActiva {
    pub fn es_admin(&self) -> bool {
        self.rol == Rol::Admin
    }

    /// Admin o Supervisor
    pub fn es_supervisor(&self) -> bool {
        matches!(self.rol, Rol::Admin | Rol::Supervisor)
    }
}

/// Datos para crear un usuario
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct NuevoUsuario {
    pub nombre: String,
    pub username: String,
    pub password: String,
    pub repetir_password: String,
    pub rol_id: Option<i64>,
}

/// Datos para editar un usuario; password vacio = sin cambio
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct EdicionUsuario {
    pub nombre: String,
    pub username: String,
    pub password: String,
    pub rol_id: Option<i64>,
    pub activo: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CambioPassword {
    pub password_actual: String,
    pub password_nuevo: String,
    pub repetir_password: String,
}
