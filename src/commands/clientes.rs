use tracing::info;

use super::{paginar, verificar_admin, Filtros};
use crate::db::Database;
use crate::error::AppError;
use crate::models::{Cliente, DatosCliente, ItemCatalogo, Pagina, SesionActiva, TIPOS_CLIENTE};
use crate::utils;

pub const POR_PAGINA: i64 = 6;

const SELECT_CLIENTE: &str = "SELECT id, nombre, apellidos, cedula, email, telefono, instagram, tipo, activo
     FROM clientes";

fn mapear(row: &rusqlite::Row) -> rusqlite::Result<Cliente> {
    Ok(Cliente {
        id: row.get(0)?,
        nombre: row.get(1)?,
        apellidos: row.get(2)?,
        cedula: row.get(3)?,
        email: row.get(4)?,
        telefono: row.get(5)?,
        instagram: row.get(6)?,
        tipo: row.get(7)?,
        activo: row.get(8)?,
    })
}

pub fn listar_clientes(
    db: &Database,
    busqueda: Option<&str>,
    pagina: i64,
) -> Result<Pagina<Cliente>, AppError> {
    let conn = db.conn.lock()?;
    let mut filtros = Filtros::default();
    if let Some(texto) = busqueda {
        filtros.agregar_texto(
            "(nombre LIKE ? OR apellidos LIKE ? OR cedula LIKE ? OR instagram LIKE ?)",
            texto,
        );
    }
    let where_sql = filtros.where_sql();
    let params = filtros.refs();

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM clientes {}", where_sql),
        params.as_slice(),
        |row| row.get(0),
    )?;

    paginar(
        |limite, offset| {
            let mut stmt = conn.prepare(&format!(
                "{} {} ORDER BY nombre, apellidos LIMIT {} OFFSET {}",
                SELECT_CLIENTE, where_sql, limite, offset
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

/// Clientes activos del tipo indicado (o `Ambos`) para selects
pub fn opciones_clientes(db: &Database, tipo: &str) -> Result<Vec<ItemCatalogo>, AppError> {
    let conn = db.conn.lock()?;
    let mut stmt = conn.prepare(
        "SELECT id, nombre || ' ' || apellidos || ' - ' || cedula FROM clientes
         WHERE activo = 1 AND tipo IN (?1, 'Ambos')
         ORDER BY nombre, apellidos",
    )?;
    let items = stmt
        .query_map(rusqlite::params![tipo], |row| {
            Ok(ItemCatalogo {
                id: row.get(0)?,
                nombre: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(items)
}

pub fn obtener_cliente(db: &Database, id: i64) -> Result<Cliente, AppError> {
    let conn = db.conn.lock()?;
    conn.query_row(
        &format!("{} WHERE id = ?1", SELECT_CLIENTE),
        rusqlite::params![id],
        mapear,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => AppError::NoEncontrado("Cliente no encontrado".into()),
        e => e.into(),
    })
}

fn validar(
    conn: &rusqlite::Connection,
    datos: &DatosCliente,
    excepto: Option<i64>,
) -> Result<Option<String>, AppError> {
    let mut errores = Vec::new();
    if datos.nombre.trim().is_empty() {
        errores.push("El Nombre es Obligatorio".to_string());
    }
    if datos.apellidos.trim().is_empty() {
        errores.push("Los Apellidos son Obligatorios".to_string());
    }
    let cedula = datos.cedula.trim();
    if cedula.is_empty() {
        errores.push("La Cedula es Obligatoria".to_string());
    } else {
        let en_uso: i64 = conn.query_row(
            "SELECT COUNT(*) FROM clientes WHERE cedula = ?1 AND id != COALESCE(?2, -1)",
            rusqlite::params![cedula, excepto],
            |row| row.get(0),
        )?;
        if en_uso > 0 {
            errores.push("La Cedula ya esta registrada".to_string());
        }
    }
    let email = utils::limpiar(datos.email.as_deref()).map(|e| e.to_lowercase());
    if let Some(email) = &email {
        if !utils::email_valido(email) {
            errores.push("El Email no es valido".to_string());
        }
    }
    if !utils::telefono_valido(datos.prefijo.trim(), datos.telefono.trim()) {
        errores.push("El Telefono debe tener un prefijo valido y 7 digitos".to_string());
    }
    if !TIPOS_CLIENTE.contains(&datos.tipo.as_str()) {
        errores.push("El Tipo de cliente no es valido".to_string());
    }

    if errores.is_empty() {
        Ok(email)
    } else {
        Err(AppError::Validacion(errores))
    }
}

pub fn crear_cliente(db: &Database, datos: &DatosCliente) -> Result<i64, AppError> {
    let conn = db.conn.lock()?;
    let email = validar(&conn, datos, None)?;
    conn.execute(
        "INSERT INTO clientes (nombre, apellidos, cedula, email, telefono, instagram, tipo, activo, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?8)",
        rusqlite::params![
            datos.nombre.trim().to_uppercase(),
            datos.apellidos.trim().to_uppercase(),
            datos.cedula.trim(),
            email,
            format!("{}{}", datos.prefijo.trim(), datos.telefono.trim()),
            utils::limpiar(datos.instagram.as_deref()),
            datos.tipo,
            db.ahora(),
        ],
    )?;
    let id = conn.last_insert_rowid();
    info!(cliente_id = id, "client created");
    Ok(id)
}

pub fn actualizar_cliente(db: &Database, id: i64, datos: &DatosCliente) -> Result<(), AppError> {
    let conn = db.conn.lock()?;
    let email = validar(&conn, datos, Some(id))?;
    let filas = conn.execute(
        "UPDATE clientes SET nombre = ?1, apellidos = ?2, cedula = ?3, email = ?4, telefono = ?5,
                instagram = ?6, tipo = ?7, activo = ?8, updated_at = ?9
         WHERE id = ?10",
        rusqlite::params![
            datos.nombre.trim().to_uppercase(),
            datos.apellidos.trim().to_uppercase(),
            datos.cedula.trim(),
            email,
            format!("{}{}", datos.prefijo.trim(), datos.telefono.trim()),
            utils::limpiar(datos.instagram.as_deref()),
            datos.tipo,
            datos.activo,
            db.ahora(),
            id,
        ],
    )?;
    if filas == 0 {
        return Err(AppError::NoEncontrado("Cliente no encontrado".into()));
    }
    Ok(())
}

pub fn eliminar_cliente(db: &Database, sesion: &SesionActiva, id: i64) -> Result<(), AppError> {
    verificar_admin(sesion)?;
    let conn = db.conn.lock()?;
    let referencias: i64 = conn.query_row(
        "SELECT (SELECT COUNT(*) FROM actividades WHERE cliente_id = ?1)
              + (SELECT COUNT(*) FROM ventas_ropa WHERE cliente_id = ?1)",
        rusqlite::params![id],
        |row| row.get(0),
    )?;
    if referencias > 0 {
        return Err(AppError::Conflicto(
            "El cliente tiene actividades o ventas registradas; desactivelo en su lugar".into(),
        ));
    }
    let filas = conn.execute("DELETE FROM clientes WHERE id = ?1", rusqlite::params![id])?;
    if filas == 0 {
        return Err(AppError::NoEncontrado("Cliente no encontrado".into()));
    }
    info!(cliente_id = id, "client deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::pruebas;

    fn datos(cedula: &str) -> DatosCliente {
        DatosCliente {
            nombre: "ana".into(),
            apellidos: "perez".into(),
            cedula: cedula.into(),
            email: Some("".into()),
            prefijo: "300".into(),
            telefono: "7654321".into(),
            instagram: Some("@ana".into()),
            tipo: "Spa".into(),
            activo: true,
        }
    }

    #[test]
    fn test_crear_cliente_mayusculas_y_email_opcional() {
        let db = Database::en_memoria().unwrap();
        let id = crear_cliente(&db, &datos("1010")).unwrap();
        let c = obtener_cliente(&db, id).unwrap();
        assert_eq!(c.nombre_completo(), "ANA PEREZ");
        assert_eq!(c.email, None);
    }

    #[test]
    fn test_cedula_unica_email_invalido() {
        let db = Database::en_memoria().unwrap();
        crear_cliente(&db, &datos("1010")).unwrap();
        let mut otro = datos("1010");
        otro.email = Some("no-es-email".into());
        match crear_cliente(&db, &otro).unwrap_err() {
            AppError::Validacion(e) => assert_eq!(e.len(), 2),
            e => panic!("error inesperado: {e:?}"),
        }
    }

    #[test]
    fn test_opciones_por_tipo() {
        let db = Database::en_memoria().unwrap();
        crear_cliente(&db, &datos("1")).unwrap();
        let mut ropa = datos("2");
        ropa.tipo = "Ropa".into();
        crear_cliente(&db, &ropa).unwrap();
        let mut ambos = datos("3");
        ambos.tipo = "Ambos".into();
        crear_cliente(&db, &ambos).unwrap();

        assert_eq!(opciones_clientes(&db, "Spa").unwrap().len(), 2);
        assert_eq!(opciones_clientes(&db, "Ropa").unwrap().len(), 2);
    }

    #[test]
    fn test_no_elimina_cliente_con_ventas() {
        let db = Database::en_memoria().unwrap();
        let id = crear_cliente(&db, &datos("1010")).unwrap();
        {
            let conn = db.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO ventas_ropa (cliente_id, total, usuario_id, created_at, updated_at)
                 VALUES (?1, 0, 1, '2026-01-01 10:00:00', '2026-01-01 10:00:00')",
                rusqlite::params![id],
            )
            .unwrap();
        }
        assert!(matches!(
            eliminar_cliente(&db, &pruebas::admin(), id),
            Err(AppError::Conflicto(_))
        ));
    }
}
