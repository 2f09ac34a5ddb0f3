use rusqlite::Connection;

use super::{paginar, verificar_supervisor, Filtros};
use crate::db::Database;
use crate::error::AppError;
use crate::models::{FiltroAuditoria, Pagina, RegistroAuditoria, SesionActiva};

pub const POR_PAGINA: i64 = 15;

/// Anexa una fila de auditoria. Se llama dentro de la transaccion del cambio.
pub fn registrar(
    conn: &Connection,
    accion: &str,
    tabla_afectada: &str,
    registro_id: &str,
    descripcion: &str,
    usuario_id: i64,
    fecha: &str,
) -> Result<(), AppError> {
    conn.execute(
        "INSERT INTO auditoria (accion, tabla_afectada, registro_id, descripcion, usuario_id, fecha)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![accion, tabla_afectada, registro_id, descripcion, usuario_id, fecha],
    )?;
    Ok(())
}

pub fn listar_auditoria(
    db: &Database,
    sesion: &SesionActiva,
    filtro: &FiltroAuditoria,
    pagina: i64,
) -> Result<Pagina<RegistroAuditoria>, AppError> {
    verificar_supervisor(sesion)?;
    let conn = db.conn.lock()?;

    let mut filtros = Filtros::default();
    if let Some(accion) = &filtro.accion {
        filtros.agregar("a.accion = ?", accion.clone());
    }
    if let Some(usuario_id) = filtro.usuario_id {
        filtros.agregar("a.usuario_id = ?", usuario_id);
    }
    if let Some(inicio) = &filtro.fecha_inicio {
        filtros.agregar("date(a.fecha) >= date(?)", inicio.clone());
    }
    if let Some(fin) = &filtro.fecha_fin {
        filtros.agregar("date(a.fecha) <= date(?)", fin.clone());
    }
    let where_sql = filtros.where_sql();
    let params = filtros.refs();

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM auditoria a {}", where_sql),
        params.as_slice(),
        |row| row.get(0),
    )?;

    paginar(
        |limite, offset| {
            let mut stmt = conn.prepare(&format!(
                "SELECT a.id, a.accion, a.tabla_afectada, a.registro_id, a.descripcion,
                        COALESCE(u.nombre, 'Usuario eliminado'), a.fecha
                 FROM auditoria a
                 LEFT JOIN usuarios u ON u.id = a.usuario_id
                 {}
                 ORDER BY a.fecha DESC, a.id DESC
                 LIMIT {} OFFSET {}",
                where_sql, limite, offset
            ))?;
            let registros = stmt
                .query_map(params.as_slice(), |row| {
                    Ok(RegistroAuditoria {
                        id: row.get(0)?,
                        accion: row.get(1)?,
                        tabla_afectada: row.get(2)?,
                        registro_id: row.get(3)?,
                        descripcion: row.get(4)?,
                        usuario: row.get(5)?,
                        fecha: row.get(6)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(registros)
        },
        total,
        pagina,
        POR_PAGINA,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::pruebas;

    fn insertar(db: &Database, accion: &str, fecha: &str) {
        let conn = db.conn.lock().unwrap();
        registrar(&conn, accion, "bancos", "1", "Prueba", 1, fecha).unwrap();
    }

    #[test]
    fn test_listar_filtra_por_accion_y_fecha() {
        let db = Database::en_memoria().unwrap();
        insertar(&db, "CREAR", "2026-03-01 09:00:00");
        insertar(&db, "ELIMINAR", "2026-03-02 09:00:00");
        insertar(&db, "CREAR", "2026-03-05 09:00:00");

        let filtro = FiltroAuditoria {
            accion: Some("CREAR".into()),
            fecha_fin: Some("2026-03-03".into()),
            ..Default::default()
        };
        let pagina = listar_auditoria(&db, &pruebas::admin(), &filtro, 1).unwrap();
        assert_eq!(pagina.total, 1);
        assert_eq!(pagina.items[0].usuario, "ADMINISTRADOR");
    }

    #[test]
    fn test_listar_requiere_supervisor() {
        let db = Database::en_memoria().unwrap();
        let res = listar_auditoria(&db, &pruebas::empleado(), &FiltroAuditoria::default(), 1);
        assert!(matches!(res, Err(AppError::NoAutorizado)));
    }

    #[test]
    fn test_paginacion_de_15() {
        let db = Database::en_memoria().unwrap();
        for i in 0..20 {
            insertar(&db, "CREAR", &format!("2026-03-01 09:{:02}:00", i));
        }
        let pagina = listar_auditoria(&db, &pruebas::admin(), &FiltroAuditoria::default(), 2)
            .unwrap();
        assert_eq!(pagina.total_paginas, 2);
        assert_eq!(pagina.items.len(), 5);
    }
}
