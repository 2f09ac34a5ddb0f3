use tracing::info;

use super::auditoria::registrar;
use super::verificar_supervisor;
use crate::db::Database;
use crate::error::{es_restriccion, AppError};
use crate::models::{Banco, SesionActiva};

pub fn listar_bancos(db: &Database, solo_activos: bool) -> Result<Vec<Banco>, AppError> {
    let conn = db.conn.lock()?;
    let mut stmt = conn.prepare(
        "SELECT id, nombre, activo FROM bancos WHERE activo = 1 OR ?1 = 0 ORDER BY nombre",
    )?;
    let bancos = stmt
        .query_map(rusqlite::params![solo_activos], |row| {
            Ok(Banco {
                id: row.get(0)?,
                nombre: row.get(1)?,
                activo: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(bancos)
}

pub fn obtener_banco(db: &Database, id: i64) -> Result<Banco, AppError> {
    let conn = db.conn.lock()?;
    conn.query_row(
        "SELECT id, nombre, activo FROM bancos WHERE id = ?1",
        rusqlite::params![id],
        |row| {
            Ok(Banco {
                id: row.get(0)?,
                nombre: row.get(1)?,
                activo: row.get(2)?,
            })
        },
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => AppError::NoEncontrado("Banco no encontrado".into()),
        e => e.into(),
    })
}

fn validar_nombre(
    conn: &rusqlite::Connection,
    nombre: &str,
    excepto: Option<i64>,
) -> Result<String, AppError> {
    let nombre = nombre.trim().to_uppercase();
    if nombre.is_empty() {
        return Err(AppError::validacion("El Nombre del banco es Obligatorio"));
    }
    let en_uso: i64 = conn.query_row(
        "SELECT COUNT(*) FROM bancos WHERE nombre = ?1 AND id != COALESCE(?2, -1)",
        rusqlite::params![nombre, excepto],
        |row| row.get(0),
    )?;
    if en_uso > 0 {
        return Err(AppError::validacion("El Banco ya existe"));
    }
    Ok(nombre)
}

pub fn crear_banco(db: &Database, sesion: &SesionActiva, nombre: &str) -> Result<i64, AppError> {
    verificar_supervisor(sesion)?;
    let mut conn = db.conn.lock()?;
    let nombre = validar_nombre(&conn, nombre, None)?;
    let ahora = db.ahora();

    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO bancos (nombre, activo, created_at) VALUES (?1, 1, ?2)",
        rusqlite::params![nombre, ahora],
    )?;
    let id = tx.last_insert_rowid();
    registrar(
        &tx,
        "CREAR",
        "bancos",
        &id.to_string(),
        &format!("Banco creado: {}", nombre),
        sesion.usuario_id,
        &ahora,
    )?;
    tx.commit()?;
    info!(banco_id = id, "bank created");
    Ok(id)
}

pub fn actualizar_banco(
    db: &Database,
    sesion: &SesionActiva,
    id: i64,
    nombre: &str,
    activo: bool,
) -> Result<(), AppError> {
    verificar_supervisor(sesion)?;
    let mut conn = db.conn.lock()?;
    let nombre = validar_nombre(&conn, nombre, Some(id))?;
    let ahora = db.ahora();

    let tx = conn.transaction()?;
    let anterior: String = tx
        .query_row(
            "SELECT nombre FROM bancos WHERE id = ?1",
            rusqlite::params![id],
            |row| row.get(0),
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                AppError::NoEncontrado("Banco no encontrado".into())
            }
            e => e.into(),
        })?;
    tx.execute(
        "UPDATE bancos SET nombre = ?1, activo = ?2 WHERE id = ?3",
        rusqlite::params![nombre, activo, id],
    )?;
    registrar(
        &tx,
        "MODIFICAR",
        "bancos",
        &id.to_string(),
        &format!("Banco modificado: {} -> {}", anterior, nombre),
        sesion.usuario_id,
        &ahora,
    )?;
    tx.commit()?;
    Ok(())
}

pub fn eliminar_banco(db: &Database, sesion: &SesionActiva, id: i64) -> Result<(), AppError> {
    verificar_supervisor(sesion)?;
    let mut conn = db.conn.lock()?;
    let ahora = db.ahora();

    let tx = conn.transaction()?;
    let nombre: String = tx
        .query_row(
            "SELECT nombre FROM bancos WHERE id = ?1",
            rusqlite::params![id],
            |row| row.get(0),
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                AppError::NoEncontrado("Banco no encontrado".into())
            }
            e => e.into(),
        })?;
    match tx.execute("DELETE FROM bancos WHERE id = ?1", rusqlite::params![id]) {
        Ok(_) => {}
        Err(e) if es_restriccion(&e) => {
            return Err(AppError::Conflicto(
                "El banco tiene pagos registrados; desactivelo en su lugar".into(),
            ))
        }
        Err(e) => return Err(e.into()),
    }
    registrar(
        &tx,
        "ELIMINAR",
        "bancos",
        &id.to_string(),
        &format!("Banco eliminado: {}", nombre),
        sesion.usuario_id,
        &ahora,
    )?;
    tx.commit()?;
    info!(banco_id = id, "bank deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::pruebas;

    #[test]
    fn test_cada_cambio_deja_auditoria() {
        let db = Database::en_memoria().unwrap();
        let admin = pruebas::admin();
        let id = crear_banco(&db, &admin, "bancolombia").unwrap();
        actualizar_banco(&db, &admin, id, "Bancolombia S.A.", true).unwrap();
        assert_eq!(obtener_banco(&db, id).unwrap().nombre, "BANCOLOMBIA S.A.");
        eliminar_banco(&db, &admin, id).unwrap();

        assert_eq!(
            pruebas::contar(&db, "SELECT COUNT(*) FROM auditoria WHERE tabla_afectada = 'bancos'"),
            3
        );
        assert!(listar_bancos(&db, false).unwrap().is_empty());
    }

    #[test]
    fn test_nombre_unico() {
        let db = Database::en_memoria().unwrap();
        crear_banco(&db, &pruebas::admin(), "Davivienda").unwrap();
        assert!(matches!(
            crear_banco(&db, &pruebas::admin(), " davivienda "),
            Err(AppError::Validacion(_))
        ));
    }

    #[test]
    fn test_empleado_no_gestiona_bancos() {
        let db = Database::en_memoria().unwrap();
        assert!(matches!(
            crear_banco(&db, &pruebas::empleado(), "Nequi"),
            Err(AppError::NoAutorizado)
        ));
    }
}
