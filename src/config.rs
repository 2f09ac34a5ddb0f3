use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
#[error("Valor invalido para {clave}: {detalle}")]
pub struct ConfigError {
    pub clave: String,
    pub detalle: String,
}

/// Datos del negocio que aparecen en las facturas
#[derive(Debug, Clone)]
pub struct Negocio {
    pub nombre: String,
    pub nit: String,
    pub direccion: String,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: PathBuf,
    /// Desplazamiento UTC de la zona horaria del negocio (Bogota = -5)
    pub utc_offset_hours: i32,
    pub session_hours: i64,
    pub fonts_dir: PathBuf,
    pub cookie_secure: bool,
    pub negocio: Negocio,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            port: try_load("PORT", "3000")?,
            database_path: PathBuf::from(load_string("DATABASE_PATH", "damaris-spa.db")),
            utc_offset_hours: try_load("UTC_OFFSET_HOURS", "-5")?,
            session_hours: try_load("SESSION_HOURS", "24")?,
            fonts_dir: PathBuf::from(load_string("FONTS_DIR", "fonts")),
            cookie_secure: try_load("COOKIE_SECURE", "false")?,
            negocio: Negocio {
                nombre: load_string("NEGOCIO_NOMBRE", "DAMARIS SPA"),
                nit: load_string("NEGOCIO_NIT", ""),
                direccion: load_string("NEGOCIO_DIRECCION", ""),
                email: load_string("NEGOCIO_EMAIL", ""),
            },
        })
    }

    /// Configuracion para pruebas: base en memoria y sin variables de entorno
    pub fn para_pruebas() -> Self {
        Self {
            port: 0,
            database_path: PathBuf::from(":memory:"),
            utc_offset_hours: -5,
            session_hours: 24,
            fonts_dir: PathBuf::from("fonts"),
            cookie_secure: false,
            negocio: Negocio {
                nombre: "DAMARIS SPA".to_string(),
                nit: "900123456-7".to_string(),
                direccion: "Calle 10 # 5-20".to_string(),
                email: "contacto@damarisspa.co".to_string(),
            },
        }
    }
}

fn load_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    load_string(key, default).parse().map_err(|e: T::Err| {
        warn!("Invalid {key} value: {e}");
        ConfigError {
            clave: key.to_string(),
            detalle: e.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_load_usa_default() {
        let valor: u16 = try_load("DAMARIS_VARIABLE_QUE_NO_EXISTE", "3000").unwrap();
        assert_eq!(valor, 3000);
    }

    #[test]
    fn test_try_load_rechaza_valor_invalido() {
        let err = try_load::<u16>("DAMARIS_VARIABLE_QUE_NO_EXISTE", "no-es-numero").unwrap_err();
        assert_eq!(err.clave, "DAMARIS_VARIABLE_QUE_NO_EXISTE");
    }
}
