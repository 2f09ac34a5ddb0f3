pub mod schema;

use chrono::{FixedOffset, NaiveDate, Offset, Utc};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;
use tracing::{info, warn};

/// Formato de las columnas de fecha-hora (hora local del negocio)
pub const FORMATO_FECHA_HORA: &str = "%Y-%m-%d %H:%M:%S";

pub struct Database {
    pub conn: Mutex<Connection>,
    zona: FixedOffset,
}

impl Database {
    pub fn new(path: &Path, utc_offset_hours: i32) -> Result<Self, rusqlite::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;

        info!(path = %path.display(), "database opened");
        Self::init(conn, utc_offset_hours)
    }

    /// Base en memoria (pruebas)
    pub fn en_memoria() -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Self::init(conn, -5)
    }

    fn init(conn: Connection, utc_offset_hours: i32) -> Result<Self, rusqlite::Error> {
        let zona = FixedOffset::east_opt(utc_offset_hours * 3600).unwrap_or_else(|| {
            warn!(utc_offset_hours, "invalid UTC offset, using UTC");
            Utc.fix()
        });

        let db = Database {
            conn: Mutex::new(conn),
            zona,
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Fecha-hora local actual como texto `YYYY-MM-DD HH:MM:SS`
    pub fn ahora(&self) -> String {
        Utc::now()
            .with_timezone(&self.zona)
            .format(FORMATO_FECHA_HORA)
            .to_string()
    }

    /// Fecha local actual
    pub fn hoy(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.zona).date_naive()
    }

    fn run_migrations(&self) -> Result<(), rusqlite::Error> {
        let conn = self.conn.lock().map_err(|_| {
            rusqlite::Error::InvalidParameterName("conexion bloqueada".to_string())
        })?;
        schema::create_tables(&conn)?;

        // Migraciones incrementales (.ok() ignora si la columna ya existe)
        conn.execute(
            "ALTER TABLE personal ADD COLUMN porcentaje_comision REAL NOT NULL DEFAULT 50",
            [],
        )
        .ok();

        seed_catalogos(&conn)?;
        seed_default_admin(&conn, &self.ahora());

        Ok(())
    }
}

/// Roles, formas de pago, unidades y categorias base
fn seed_catalogos(conn: &Connection) -> Result<(), rusqlite::Error> {
    for rol in ["Admin", "Empleado", "Supervisor"] {
        conn.execute(
            "INSERT OR IGNORE INTO roles (nombre) VALUES (?1)",
            rusqlite::params![rol],
        )?;
    }

    for forma in ["Efectivo", "Datafono", "Transferencia"] {
        conn.execute(
            "INSERT OR IGNORE INTO formas_pago (nombre) VALUES (?1)",
            rusqlite::params![forma],
        )?;
    }

    let unidades = [
        ("Unidad", "und"),
        ("Kilo", "kg"),
        ("Gramo", "g"),
        ("Litro", "l"),
        ("Mililitro", "ml"),
        ("Pagos", "pago"),
    ];
    for (nombre, abreviatura) in unidades {
        conn.execute(
            "INSERT OR IGNORE INTO unidades_medida (nombre, abreviatura) VALUES (?1, ?2)",
            rusqlite::params![nombre, abreviatura],
        )?;
    }

    let categorias = [
        ("INSUMOS DE MANICURA", "Insumos usados en los servicios", true),
        ("SERVICIOS PÚBLICOS", "Agua, luz, internet", false),
        ("COSTOS OPERATIVOS", "Arriendo y otros costos", false),
        ("GASTOS ADMINISTRATIVOS", "Papeleria y aseo", false),
    ];
    for (nombre, descripcion, afecta_stock) in categorias {
        conn.execute(
            "INSERT OR IGNORE INTO categorias (nombre, descripcion, afecta_stock) VALUES (?1, ?2, ?3)",
            rusqlite::params![nombre, descripcion, afecta_stock],
        )?;
    }

    Ok(())
}

/// Inserta el usuario admin (password admin123) si no hay usuarios
fn seed_default_admin(conn: &Connection, ahora: &str) {
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM usuarios", [], |row| row.get(0))
        .unwrap_or(0);

    if count == 0 {
        let salt = crate::utils::generar_salt();
        let password_hash = crate::utils::hash_password(&salt, "admin123");
        let insertado = conn.execute(
            "INSERT INTO usuarios (nombre, username, password_hash, password_salt, rol_id, activo, created_at, updated_at)
             SELECT 'ADMINISTRADOR', 'admin', ?1, ?2, id, 1, ?3, ?3 FROM roles WHERE nombre = 'Admin'",
            rusqlite::params![password_hash, salt, ahora],
        );
        match insertado {
            Ok(_) => warn!("default admin user created, change its password"),
            Err(e) => warn!(error = %e, "could not seed default admin"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_idempotente() {
        let db = Database::en_memoria().unwrap();
        db.run_migrations().unwrap();
        let conn = db.conn.lock().unwrap();
        let roles: i64 = conn
            .query_row("SELECT COUNT(*) FROM roles", [], |r| r.get(0))
            .unwrap();
        let usuarios: i64 = conn
            .query_row("SELECT COUNT(*) FROM usuarios", [], |r| r.get(0))
            .unwrap();
        assert_eq!(roles, 3);
        assert_eq!(usuarios, 1);
    }

    #[test]
    fn test_auditoria_no_se_modifica() {
        let db = Database::en_memoria().unwrap();
        let conn = db.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO auditoria (accion, tabla_afectada, registro_id, descripcion, usuario_id, fecha)
             VALUES ('CREAR', 'bancos', '1', 'x', 1, '2026-01-01 10:00:00')",
            [],
        )
        .unwrap();
        assert!(conn
            .execute("UPDATE auditoria SET accion = 'OTRA'", [])
            .is_err());
        assert!(conn.execute("DELETE FROM auditoria", []).is_err());
    }

    #[test]
    fn test_ahora_formato() {
        let db = Database::en_memoria().unwrap();
        let ahora = db.ahora();
        assert!(chrono::NaiveDateTime::parse_from_str(&ahora, FORMATO_FECHA_HORA).is_ok());
    }

    #[test]
    fn test_reabrir_archivo_no_duplica_semillas() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("datos").join("spa.db");
        drop(Database::new(&path, -5).unwrap());

        let db = Database::new(&path, -5).unwrap();
        let conn = db.conn.lock().unwrap();
        let formas: i64 = conn
            .query_row("SELECT COUNT(*) FROM formas_pago", [], |r| r.get(0))
            .unwrap();
        assert_eq!(formas, 3);
    }
}
