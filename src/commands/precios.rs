use tracing::info;

use super::verificar_admin;
use crate::db::Database;
use crate::error::{es_restriccion, AppError};
use crate::models::{Precio, SesionActiva};

pub fn listar_precios(db: &Database) -> Result<Vec<Precio>, AppError> {
    let conn = db.conn.lock()?;
    let mut stmt = conn.prepare("SELECT id, monto FROM precios ORDER BY monto")?;
    let precios = stmt
        .query_map([], |row| {
            Ok(Precio {
                id: row.get(0)?,
                monto: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(precios)
}

pub fn obtener_precio(db: &Database, id: i64) -> Result<Precio, AppError> {
    let conn = db.conn.lock()?;
    conn.query_row(
        "SELECT id, monto FROM precios WHERE id = ?1",
        rusqlite::params![id],
        |row| {
            Ok(Precio {
                id: row.get(0)?,
                monto: row.get(1)?,
            })
        },
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => AppError::NoEncontrado("Precio no encontrado".into()),
        e => e.into(),
    })
}

fn validar(conn: &rusqlite::Connection, monto: Option<f64>, excepto: Option<i64>) -> Result<f64, AppError> {
    let monto = match monto {
        Some(m) if m.is_finite() && m > 0.0 => m,
        _ => return Err(AppError::validacion("El Monto debe ser mayor a 0")),
    };
    let en_uso: i64 = conn.query_row(
        "SELECT COUNT(*) FROM precios WHERE monto = ?1 AND id != COALESCE(?2, -1)",
        rusqlite::params![monto, excepto],
        |row| row.get(0),
    )?;
    if en_uso > 0 {
        return Err(AppError::validacion("El Precio ya existe"));
    }
    Ok(monto)
}

pub fn crear_precio(db: &Database, monto: Option<f64>) -> Result<i64, AppError> {
    let conn = db.conn.lock()?;
    let monto = validar(&conn, monto, None)?;
    conn.execute(
        "INSERT INTO precios (monto, created_at) VALUES (?1, ?2)",
        rusqlite::params![monto, db.ahora()],
    )?;
    let id = conn.last_insert_rowid();
    info!(precio_id = id, monto, "price created");
    Ok(id)
}

pub fn actualizar_precio(db: &Database, id: i64, monto: Option<f64>) -> Result<(), AppError> {
    let conn = db.conn.lock()?;
    let monto = validar(&conn, monto, Some(id))?;
    let filas = conn.execute(
        "UPDATE precios SET monto = ?1 WHERE id = ?2",
        rusqlite::params![monto, id],
    )?;
    if filas == 0 {
        return Err(AppError::NoEncontrado("Precio no encontrado".into()));
    }
    Ok(())
}

pub fn eliminar_precio(db: &Database, sesion: &SesionActiva, id: i64) -> Result<(), AppError> {
    verificar_admin(sesion)?;
    let conn = db.conn.lock()?;
    match conn.execute("DELETE FROM precios WHERE id = ?1", rusqlite::params![id]) {
        Ok(0) => Err(AppError::NoEncontrado("Precio no encontrado".into())),
        Ok(_) => Ok(()),
        Err(e) if es_restriccion(&e) => Err(AppError::Conflicto(
            "El precio esta asignado a procedimientos o actividades".into(),
        )),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::pruebas;

    #[test]
    fn test_monto_positivo_y_unico() {
        let db = Database::en_memoria().unwrap();
        assert!(crear_precio(&db, Some(0.0)).is_err());
        assert!(crear_precio(&db, None).is_err());
        let id = crear_precio(&db, Some(35000.0)).unwrap();
        assert!(crear_precio(&db, Some(35000.0)).is_err());
        actualizar_precio(&db, id, Some(35000.0)).unwrap();
        assert_eq!(listar_precios(&db).unwrap().len(), 1);
    }

    #[test]
    fn test_no_elimina_precio_en_uso() {
        let db = Database::en_memoria().unwrap();
        let (_, precio_id) = pruebas::procedimiento(&db, "MANICURA", 20000.0);
        assert!(matches!(
            eliminar_precio(&db, &pruebas::admin(), precio_id),
            Err(AppError::Conflicto(_))
        ));
    }

    #[test]
    fn test_monto_no_finito() {
        let db = Database::en_memoria().unwrap();
        assert!(crear_precio(&db, Some(f64::INFINITY)).is_err());
        assert!(crear_precio(&db, Some(f64::NAN)).is_err());
        assert!(listar_precios(&db).unwrap().is_empty());
    }
}
