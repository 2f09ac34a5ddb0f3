use tracing::info;

use super::auditoria::registrar;
use super::{paginar, verificar_admin, Filtros};
use crate::db::Database;
use crate::error::{es_restriccion, AppError};
use crate::models::{DatosProcedimiento, ItemCatalogo, Pagina, Procedimiento, SesionActiva};

pub const POR_PAGINA: i64 = 8;

const SELECT_PROCEDIMIENTO: &str = "SELECT p.id, p.nombre, p.precio_id, pr.monto, p.activo
     FROM procedimientos p LEFT JOIN precios pr ON pr.id = p.precio_id";

fn mapear(row: &rusqlite::Row) -> rusqlite::Result<Procedimiento> {
    Ok(Procedimiento {
        id: row.get(0)?,
        nombre: row.get(1)?,
        precio_id: row.get(2)?,
        precio: row.get(3)?,
        activo: row.get(4)?,
    })
}

pub fn listar_procedimientos(
    db: &Database,
    busqueda: Option<&str>,
    pagina: i64,
) -> Result<Pagina<Procedimiento>, AppError> {
    let conn = db.conn.lock()?;
    let mut filtros = Filtros::default();
    if let Some(texto) = busqueda {
        filtros.agregar_texto("p.nombre LIKE ?", texto);
    }
    let where_sql = filtros.where_sql();
    let params = filtros.refs();

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM procedimientos p {}", where_sql),
        params.as_slice(),
        |row| row.get(0),
    )?;

    paginar(
        |limite, offset| {
            let mut stmt = conn.prepare(&format!(
                "{} {} ORDER BY p.nombre LIMIT {} OFFSET {}",
                SELECT_PROCEDIMIENTO, where_sql, limite, offset
            ))?;
            let items = stmt
                .query_map(params.as_slice(), mapear)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(items)
        },
        total,
        pagina,
        POR_PAGINA,
    )
}

pub fn opciones_procedimientos(db: &Database) -> Result<Vec<ItemCatalogo>, AppError> {
    let conn = db.conn.lock()?;
    let mut stmt =
        conn.prepare("SELECT id, nombre FROM procedimientos WHERE activo = 1 ORDER BY nombre")?;
    let items = stmt
        .query_map([], |row| {
            Ok(ItemCatalogo {
                id: row.get(0)?,
                nombre: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(items)
}

pub fn obtener_procedimiento(db: &Database, id: i64) -> Result<Procedimiento, AppError> {
    let conn = db.conn.lock()?;
    conn.query_row(
        &format!("{} WHERE p.id = ?1", SELECT_PROCEDIMIENTO),
        rusqlite::params![id],
        mapear,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => {
            AppError::NoEncontrado("Procedimiento no encontrado".into())
        }
        e => e.into(),
    })
}

fn validar(
    conn: &rusqlite::Connection,
    datos: &DatosProcedimiento,
    excepto: Option<i64>,
) -> Result<String, AppError> {
    let nombre = datos.nombre.trim().to_uppercase();
    let mut errores = Vec::new();
    if nombre.is_empty() {
        errores.push("El Nombre es Obligatorio".to_string());
    } else {
        let en_uso: i64 = conn.query_row(
            "SELECT COUNT(*) FROM procedimientos WHERE nombre = ?1 AND id != COALESCE(?2, -1)",
            rusqlite::params![nombre, excepto],
            |row| row.get(0),
        )?;
        if en_uso > 0 {
            errores.push("El Procedimiento ya existe".to_string());
        }
    }
    if datos.precio_id.is_none() {
        errores.push("El Precio es Obligatorio".to_string());
    }
    if errores.is_empty() {
        Ok(nombre)
    } else {
        Err(AppError::Validacion(errores))
    }
}

pub fn crear_procedimiento(db: &Database, datos: &DatosProcedimiento) -> Result<i64, AppError> {
    let conn = db.conn.lock()?;
    let nombre = validar(&conn, datos, None)?;
    conn.execute(
        "INSERT INTO procedimientos (nombre, precio_id, activo, created_at, updated_at)
         VALUES (?1, ?2, 1, ?3, ?3)",
        rusqlite::params![nombre, datos.precio_id, db.ahora()],
    )?;
    let id = conn.last_insert_rowid();
    info!(procedimiento_id = id, "procedure created");
    Ok(id)
}

pub fn actualizar_procedimiento(
    db: &Database,
    sesion: &SesionActiva,
    id: i64,
    datos: &DatosProcedimiento,
) -> Result<(), AppError> {
    let mut conn = db.conn.lock()?;
    let nombre = validar(&conn, datos, Some(id))?;
    let ahora = db.ahora();

    let tx = conn.transaction()?;
    let filas = tx.execute(
        "UPDATE procedimientos SET nombre = ?1, precio_id = ?2, activo = ?3, updated_at = ?4
         WHERE id = ?5",
        rusqlite::params![nombre, datos.precio_id, datos.activo, ahora, id],
    )?;
    if filas == 0 {
        return Err(AppError::NoEncontrado("Procedimiento no encontrado".into()));
    }
    registrar(
        &tx,
        "MODIFICAR",
        "procedimientos",
        &id.to_string(),
        &format!("Procedimiento modificado: {}", nombre),
        sesion.usuario_id,
        &ahora,
    )?;
    tx.commit()?;
    Ok(())
}

pub fn eliminar_procedimiento(
    db: &Database,
    sesion: &SesionActiva,
    id: i64,
) -> Result<(), AppError> {
    verificar_admin(sesion)?;
    let mut conn = db.conn.lock()?;
    let ahora = db.ahora();

    let tx = conn.transaction()?;
    let nombre: String = tx
        .query_row(
            "SELECT nombre FROM procedimientos WHERE id = ?1",
            rusqlite::params![id],
            |row| row.get(0),
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                AppError::NoEncontrado("Procedimiento no encontrado".into())
            }
            e => e.into(),
        })?;
    match tx.execute("DELETE FROM procedimientos WHERE id = ?1", rusqlite::params![id]) {
        Ok(_) => {}
        Err(e) if es_restriccion(&e) => {
            return Err(AppError::Conflicto(
                "El procedimiento tiene actividades registradas; desactivelo en su lugar".into(),
            ))
        }
        Err(e) => return Err(e.into()),
    }
    registrar(
        &tx,
        "ELIMINAR",
        "procedimientos",
        &id.to_string(),
        &format!("Procedimiento eliminado: {}", nombre),
        sesion.usuario_id,
        &ahora,
    )?;
    tx.commit()?;
    info!(procedimiento_id = id, "procedure deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{precios, pruebas};

    #[test]
    fn test_crud_con_auditoria() {
        let db = Database::en_memoria().unwrap();
        let precio_id = precios::crear_precio(&db, Some(25000.0)).unwrap();
        let datos = DatosProcedimiento {
            nombre: "pedicura spa".into(),
            precio_id: Some(precio_id),
            activo: true,
        };
        let id = crear_procedimiento(&db, &datos).unwrap();
        let p = obtener_procedimiento(&db, id).unwrap();
        assert_eq!(p.nombre, "PEDICURA SPA");
        assert_eq!(p.precio, Some(25000.0));

        actualizar_procedimiento(&db, &pruebas::admin(), id, &datos).unwrap();
        eliminar_procedimiento(&db, &pruebas::admin(), id).unwrap();
        assert_eq!(
            pruebas::contar(&db, "SELECT COUNT(*) FROM auditoria WHERE tabla_afectada = 'procedimientos'"),
            2
        );
    }

    #[test]
    fn test_nombre_unico_y_precio_obligatorio() {
        let db = Database::en_memoria().unwrap();
        pruebas::procedimiento(&db, "MANICURA", 20000.0);
        let datos = DatosProcedimiento {
            nombre: "Manicura".into(),
            precio_id: None,
            activo: true,
        };
        match crear_procedimiento(&db, &datos).unwrap_err() {
            AppError::Validacion(e) => assert_eq!(e.len(), 2),
            e => panic!("error inesperado: {e:?}"),
        }
    }
}
