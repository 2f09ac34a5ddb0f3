use tracing::info;

use super::{paginar, verificar_admin, Filtros};
use crate::db::Database;
use crate::error::AppError;
use crate::models::{DatosPersonal, ItemCatalogo, Pagina, Personal, SesionActiva};
use crate::utils;

pub const POR_PAGINA: i64 = 8;

const SELECT_PERSONAL: &str =
    "SELECT id, nombre, apellidos, email, telefono, porcentaje_comision, activo FROM personal";

fn mapear(row: &rusqlite::Row) -> rusqlite::Result<Personal> {
    Ok(Personal {
        id: row.get(0)?,
        nombre: row.get(1)?,
        apellidos: row.get(2)?,
        email: row.get(3)?,
        telefono: row.get(4)?,
        porcentaje_comision: row.get(5)?,
        activo: row.get(6)?,
    })
}

pub fn listar_personal(
    db: &Database,
    busqueda: Option<&str>,
    pagina: i64,
) -> Result<Pagina<Personal>, AppError> {
    let conn = db.conn.lock()?;
    let mut filtros = Filtros::default();
    if let Some(texto) = busqueda {
        filtros.agregar_texto("(nombre LIKE ? OR apellidos LIKE ? OR email LIKE ?)", texto);
    }
    let where_sql = filtros.where_sql();
    let params = filtros.refs();

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM personal {}", where_sql),
        params.as_slice(),
        |row| row.get(0),
    )?;

    paginar(
        |limite, offset| {
            let mut stmt = conn.prepare(&format!(
                "{} {} ORDER BY nombre, apellidos LIMIT {} OFFSET {}",
                SELECT_PERSONAL, where_sql, limite, offset
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

/// Personal activo para selects
pub fn opciones_personal(db: &Database) -> Result<Vec<ItemCatalogo>, AppError> {
    let conn = db.conn.lock()?;
    let mut stmt = conn.prepare(
        "SELECT id, nombre || ' ' || apellidos FROM personal WHERE activo = 1 ORDER BY nombre",
    )?;
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

pub fn obtener_personal(db: &Database, id: i64) -> Result<Personal, AppError> {
    let conn = db.conn.lock()?;
    conn.query_row(
        &format!("{} WHERE id = ?1", SELECT_PERSONAL),
        rusqlite::params![id],
        mapear,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => AppError::NoEncontrado("Personal no encontrado".into()),
        e => e.into(),
    })
}

fn validar(
    conn: &rusqlite::Connection,
    datos: &DatosPersonal,
    excepto: Option<i64>,
) -> Result<(String, f64), AppError> {
    let mut errores = Vec::new();
    if datos.nombre.trim().is_empty() {
        errores.push("El Nombre es Obligatorio".to_string());
    }
    if datos.apellidos.trim().is_empty() {
        errores.push("Los Apellidos son Obligatorios".to_string());
    }
    let email = datos.email.trim().to_lowercase();
    if !utils::email_valido(&email) {
        errores.push("El Email no es valido".to_string());
    } else {
        let en_uso: i64 = conn.query_row(
            "SELECT COUNT(*) FROM personal WHERE email = ?1 AND id != COALESCE(?2, -1)",
            rusqlite::params![email, excepto],
            |row| row.get(0),
        )?;
        if en_uso > 0 {
            errores.push("El Email ya esta registrado".to_string());
        }
    }
    if !utils::telefono_valido(datos.prefijo.trim(), datos.telefono.trim()) {
        errores.push("El Telefono debe tener un prefijo valido y 7 digitos".to_string());
    }
    let porcentaje = datos.porcentaje_comision.unwrap_or(50.0);
    if !(0.0..=100.0).contains(&porcentaje) {
        errores.push("El Porcentaje debe estar entre 0 y 100".to_string());
    }

    if errores.is_empty() {
        Ok((email, porcentaje))
    } else {
        Err(AppError::Validacion(errores))
    }
}

pub fn crear_personal(db: &Database, datos: &DatosPersonal) -> Result<i64, AppError> {
    let conn = db.conn.lock()?;
    let (email, porcentaje) = validar(&conn, datos, None)?;
    let ahora = db.ahora();
    conn.execute(
        "INSERT INTO personal (nombre, apellidos, email, telefono, porcentaje_comision, activo, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)",
        rusqlite::params![
            datos.nombre.trim().to_uppercase(),
            datos.apellidos.trim().to_uppercase(),
            email,
            format!("{}{}", datos.prefijo.trim(), datos.telefono.trim()),
            porcentaje,
            ahora,
        ],
    )?;
    let id = conn.last_insert_rowid();
    info!(personal_id = id, "staff member created");
    Ok(id)
}

pub fn actualizar_personal(db: &Database, id: i64, datos: &DatosPersonal) -> Result<(), AppError> {
    let conn = db.conn.lock()?;
    let (email, porcentaje) = validar(&conn, datos, Some(id))?;
    let filas = conn.execute(
        "UPDATE personal SET nombre = ?1, apellidos = ?2, email = ?3, telefono = ?4,
                porcentaje_comision = ?5, activo = ?6, updated_at = ?7
         WHERE id = ?8",
        rusqlite::params![
            datos.nombre.trim().to_uppercase(),
            datos.apellidos.trim().to_uppercase(),
            email,
            format!("{}{}", datos.prefijo.trim(), datos.telefono.trim()),
            porcentaje,
            datos.activo,
            db.ahora(),
            id,
        ],
    )?;
    if filas == 0 {
        return Err(AppError::NoEncontrado("Personal no encontrado".into()));
    }
    Ok(())
}

/// Solo Admin. No se elimina personal con actividades; se desactiva.
pub fn eliminar_personal(db: &Database, sesion: &SesionActiva, id: i64) -> Result<(), AppError> {
    verificar_admin(sesion)?;
    let conn = db.conn.lock()?;
    let actividades: i64 = conn.query_row(
        "SELECT COUNT(*) FROM actividades WHERE personal_id = ?1",
        rusqlite::params![id],
        |row| row.get(0),
    )?;
    if actividades > 0 {
        return Err(AppError::Conflicto(
            "El personal tiene actividades registradas; desactivelo en su lugar".into(),
        ));
    }
    let filas = conn.execute("DELETE FROM personal WHERE id = ?1", rusqlite::params![id])?;
    if filas == 0 {
        return Err(AppError::NoEncontrado("Personal no encontrado".into()));
    }
    info!(personal_id = id, "staff member deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::pruebas;

    fn datos(email: &str) -> DatosPersonal {
        DatosPersonal {
            nombre: "maria".into(),
            apellidos: "lopez".into(),
            email: email.into(),
            prefijo: "310".into(),
            telefono: "1234567".into(),
            porcentaje_comision: Some(40.0),
            activo: true,
        }
    }

    #[test]
    fn test_crear_y_obtener() {
        let db = Database::en_memoria().unwrap();
        let id = crear_personal(&db, &datos("Maria@Spa.co")).unwrap();
        let p = obtener_personal(&db, id).unwrap();
        assert_eq!(p.nombre_completo(), "MARIA LOPEZ");
        assert_eq!(p.email, "maria@spa.co");
        assert_eq!(p.telefono, "3101234567");
        assert_eq!(p.porcentaje_comision, 40.0);
    }

    #[test]
    fn test_email_unico_y_telefono() {
        let db = Database::en_memoria().unwrap();
        crear_personal(&db, &datos("maria@spa.co")).unwrap();
        let mut otro = datos("maria@spa.co");
        otro.prefijo = "303".into();
        match crear_personal(&db, &otro).unwrap_err() {
            AppError::Validacion(e) => assert_eq!(e.len(), 2),
            e => panic!("error inesperado: {e:?}"),
        }
    }

    #[test]
    fn test_listar_pagina_de_8() {
        let db = Database::en_memoria().unwrap();
        for i in 0..10 {
            crear_personal(&db, &datos(&format!("p{i}@spa.co"))).unwrap();
        }
        let pagina = listar_personal(&db, None, 2).unwrap();
        assert_eq!(pagina.items.len(), 2);
        let filtrada = listar_personal(&db, Some("p3@"), 1).unwrap();
        assert_eq!(filtrada.total, 1);
    }

    #[test]
    fn test_eliminar_solo_admin_y_sin_actividades() {
        let db = Database::en_memoria().unwrap();
        let id = crear_personal(&db, &datos("maria@spa.co")).unwrap();
        assert!(matches!(
            eliminar_personal(&db, &pruebas::empleado(), id),
            Err(AppError::NoAutorizado)
        ));
        eliminar_personal(&db, &pruebas::admin(), id).unwrap();
        assert!(obtener_personal(&db, id).is_err());
    }
}
