use tracing::info;

use super::{paginar, verificar_admin, Filtros};
use crate::db::Database;
use crate::error::{es_restriccion, AppError};
use crate::models::{DatosProveedor, ItemCatalogo, Pagina, Proveedor, SesionActiva, TIPOS_DOCUMENTO};
use crate::utils;

pub const POR_PAGINA: i64 = 10;

const SELECT_PROVEEDOR: &str = "SELECT id, tipo_documento, numero_documento, razon_social, email, telefono, direccion, activo
     FROM proveedores";

fn mapear(row: &rusqlite::Row) -> rusqlite::Result<Proveedor> {
    Ok(Proveedor {
        id: row.get(0)?,
        tipo_documento: row.get(1)?,
        numero_documento: row.get(2)?,
        razon_social: row.get(3)?,
        email: row.get(4)?,
        telefono: row.get(5)?,
        direccion: row.get(6)?,
        activo: row.get(7)?,
    })
}

pub fn listar_proveedores(
    db: &Database,
    busqueda: Option<&str>,
    pagina: i64,
) -> Result<Pagina<Proveedor>, AppError> {
    let conn = db.conn.lock()?;
    let mut filtros = Filtros::default();
    if let Some(texto) = busqueda {
        filtros.agregar_texto("(razon_social LIKE ? OR numero_documento LIKE ?)", texto);
    }
    let where_sql = filtros.where_sql();
    let params = filtros.refs();

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM proveedores {}", where_sql),
        params.as_slice(),
        |row| row.get(0),
    )?;

    paginar(
        |limite, offset| {
            let mut stmt = conn.prepare(&format!(
                "{} {} ORDER BY razon_social LIMIT {} OFFSET {}",
                SELECT_PROVEEDOR, where_sql, limite, offset
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

pub fn opciones_proveedores(db: &Database) -> Result<Vec<ItemCatalogo>, AppError> {
    let conn = db.conn.lock()?;
    let mut stmt =
        conn.prepare("SELECT id, razon_social FROM proveedores WHERE activo = 1 ORDER BY razon_social")?;
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

pub fn obtener_proveedor(db: &Database, id: i64) -> Result<Proveedor, AppError> {
    let conn = db.conn.lock()?;
    conn.query_row(
        &format!("{} WHERE id = ?1", SELECT_PROVEEDOR),
        rusqlite::params![id],
        mapear,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => {
            AppError::NoEncontrado("Proveedor no encontrado".into())
        }
        e => e.into(),
    })
}

fn validar(
    conn: &rusqlite::Connection,
    datos: &DatosProveedor,
    excepto: Option<i64>,
) -> Result<Option<String>, AppError> {
    let mut errores = Vec::new();
    if !TIPOS_DOCUMENTO.contains(&datos.tipo_documento.as_str()) {
        errores.push("El Tipo de documento no es valido".to_string());
    }
    let numero = datos.numero_documento.trim();
    if numero.is_empty() {
        errores.push("El Numero de documento es Obligatorio".to_string());
    } else {
        let en_uso: i64 = conn.query_row(
            "SELECT COUNT(*) FROM proveedores WHERE numero_documento = ?1 AND id != COALESCE(?2, -1)",
            rusqlite::params![numero, excepto],
            |row| row.get(0),
        )?;
        if en_uso > 0 {
            errores.push("El Numero de documento ya esta registrado".to_string());
        }
    }
    if datos.razon_social.trim().is_empty() {
        errores.push("La Razon social es Obligatoria".to_string());
    }
    let email = utils::limpiar(datos.email.as_deref()).map(|e| e.to_lowercase());
    if let Some(email) = &email {
        if !utils::email_valido(email) {
            errores.push("El Email no es valido".to_string());
        }
    }
    if errores.is_empty() {
        Ok(email)
    } else {
        Err(AppError::Validacion(errores))
    }
}

pub fn crear_proveedor(db: &Database, datos: &DatosProveedor) -> Result<i64, AppError> {
    let conn = db.conn.lock()?;
    let email = validar(&conn, datos, None)?;
    conn.execute(
        "INSERT INTO proveedores (tipo_documento, numero_documento, razon_social, email, telefono, direccion, activo, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?7)",
        rusqlite::params![
            datos.tipo_documento,
            datos.numero_documento.trim(),
            datos.razon_social.trim().to_uppercase(),
            email,
            utils::limpiar(datos.telefono.as_deref()),
            utils::limpiar(datos.direccion.as_deref()),
            db.ahora(),
        ],
    )?;
    let id = conn.last_insert_rowid();
    info!(proveedor_id = id, "supplier created");
    Ok(id)
}

pub fn actualizar_proveedor(
    db: &Database,
    id: i64,
    datos: &DatosProveedor,
) -> Result<(), AppError> {
    let conn = db.conn.lock()?;
    let email = validar(&conn, datos, Some(id))?;
    let filas = conn.execute(
        "UPDATE proveedores SET tipo_documento = ?1, numero_documento = ?2, razon_social = ?3,
                email = ?4, telefono = ?5, direccion = ?6, activo = ?7, updated_at = ?8
         WHERE id = ?9",
        rusqlite::params![
            datos.tipo_documento,
            datos.numero_documento.trim(),
            datos.razon_social.trim().to_uppercase(),
            email,
            utils::limpiar(datos.telefono.as_deref()),
            utils::limpiar(datos.direccion.as_deref()),
            datos.activo,
            db.ahora(),
            id,
        ],
    )?;
    if filas == 0 {
        return Err(AppError::NoEncontrado("Proveedor no encontrado".into()));
    }
    Ok(())
}

pub fn eliminar_proveedor(db: &Database, sesion: &SesionActiva, id: i64) -> Result<(), AppError> {
    verificar_admin(sesion)?;
    let conn = db.conn.lock()?;
    match conn.execute("DELETE FROM proveedores WHERE id = ?1", rusqlite::params![id]) {
        Ok(0) => Err(AppError::NoEncontrado("Proveedor no encontrado".into())),
        Ok(_) => Ok(()),
        Err(e) if es_restriccion(&e) => Err(AppError::Conflicto(
            "El proveedor tiene gastos registrados".into(),
        )),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::pruebas;

    fn datos(numero: &str) -> DatosProveedor {
        DatosProveedor {
            tipo_documento: "NIT".into(),
            numero_documento: numero.into(),
            razon_social: "distribuidora belleza".into(),
            email: None,
            telefono: Some("6041234".into()),
            direccion: None,
            activo: true,
        }
    }

    #[test]
    fn test_crear_y_documento_unico() {
        let db = Database::en_memoria().unwrap();
        let id = crear_proveedor(&db, &datos("900")).unwrap();
        assert_eq!(
            obtener_proveedor(&db, id).unwrap().razon_social,
            "DISTRIBUIDORA BELLEZA"
        );
        assert!(matches!(
            crear_proveedor(&db, &datos("900")),
            Err(AppError::Validacion(_))
        ));
    }

    #[test]
    fn test_no_elimina_proveedor_con_gastos() {
        let db = Database::en_memoria().unwrap();
        let id = crear_proveedor(&db, &datos("900")).unwrap();
        {
            let conn = db.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO gastos_adicionales (numero_factura, proveedor_id, fecha_gasto, valor_total, usuario_id, created_at, updated_at)
                 VALUES ('F1', ?1, '2026-01-01', 10, 1, '2026-01-01 10:00:00', '2026-01-01 10:00:00')",
                rusqlite::params![id],
            )
            .unwrap();
        }
        assert!(matches!(
            eliminar_proveedor(&db, &pruebas::admin(), id),
            Err(AppError::Conflicto(_))
        ));
    }
}
