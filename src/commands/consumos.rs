//! Gastos administrativos: consumo interno de insumos del inventario.

use rusqlite::Connection;
use tracing::info;

use super::auditoria::registrar;
use super::inventario::{descontar_stock, devolver_stock};
use super::{paginar, verificar_supervisor};
use crate::db::Database;
use crate::error::AppError;
use crate::models::{
    DetalleConsumo, GastoAdministrativo, LineaInsumo, NuevoGastoAdministrativo, Pagina,
    SesionActiva, GASTO_ANULADO, GASTO_CONSOLIDADO,
};

pub const POR_PAGINA: i64 = 10;

fn validar(datos: &NuevoGastoAdministrativo) -> Result<String, AppError> {
    let mut errores = Vec::new();
    let descripcion = datos.descripcion.trim().to_string();
    if descripcion.is_empty() {
        errores.push("La Descripcion es Obligatoria".to_string());
    }
    if datos.lineas.is_empty() {
        errores.push("Debe agregar al menos un articulo".to_string());
    }
    if datos.lineas.iter().any(|l| !l.cantidad.is_finite() || l.cantidad <= 0.0) {
        errores.push("Las cantidades deben ser mayores a 0".to_string());
    }
    if errores.is_empty() {
        Ok(descripcion)
    } else {
        Err(AppError::Validacion(errores))
    }
}

fn insertar_lineas(conn: &Connection, gasto_id: i64, lineas: &[LineaInsumo]) -> Result<(), AppError> {
    for linea in lineas {
        conn.execute(
            "INSERT INTO detalle_gasto_administrativo (gasto_id, articulo_id, cantidad) VALUES (?1, ?2, ?3)",
            rusqlite::params![gasto_id, linea.articulo_id, linea.cantidad],
        )?;
    }
    Ok(())
}

fn lineas_actuales(conn: &Connection, gasto_id: i64) -> Result<Vec<LineaInsumo>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT articulo_id, cantidad FROM detalle_gasto_administrativo WHERE gasto_id = ?1",
    )?;
    let lineas = stmt
        .query_map(rusqlite::params![gasto_id], |row| {
            Ok(LineaInsumo {
                articulo_id: row.get(0)?,
                cantidad: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(lineas)
}

fn estado(conn: &Connection, id: i64) -> Result<String, AppError> {
    conn.query_row(
        "SELECT estado FROM gastos_administrativos WHERE id = ?1",
        rusqlite::params![id],
        |row| row.get(0),
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => {
            AppError::NoEncontrado("Gasto administrativo no encontrado".into())
        }
        e => e.into(),
    })
}

pub fn crear_consumo(
    db: &Database,
    sesion: &SesionActiva,
    datos: &NuevoGastoAdministrativo,
) -> Result<i64, AppError> {
    let descripcion = validar(datos)?;
    let mut conn = db.conn.lock()?;
    let ahora = db.ahora();

    let tx = conn.transaction()?;
    descontar_stock(&tx, &datos.lineas, &ahora)?;
    tx.execute(
        "INSERT INTO gastos_administrativos (descripcion, estado, usuario_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)",
        rusqlite::params![descripcion, GASTO_CONSOLIDADO, sesion.usuario_id, ahora],
    )?;
    let id = tx.last_insert_rowid();
    insertar_lineas(&tx, id, &datos.lineas)?;
    tx.commit()?;

    info!(consumo_id = id, lineas = datos.lineas.len(), "internal consumption registered");
    Ok(id)
}

const SELECT_CONSUMO: &str = "SELECT g.id, g.descripcion, g.estado, u.nombre, g.created_at
     FROM gastos_administrativos g JOIN usuarios u ON u.id = g.usuario_id";

fn mapear(row: &rusqlite::Row) -> rusqlite::Result<GastoAdministrativo> {
    Ok(GastoAdministrativo {
        id: row.get(0)?,
        descripcion: row.get(1)?,
        estado: row.get(2)?,
        usuario: row.get(3)?,
        created_at: row.get(4)?,
        detalles: Vec::new(),
    })
}

fn cargar_detalles(conn: &Connection, gasto: &mut GastoAdministrativo) -> Result<(), AppError> {
    let mut stmt = conn.prepare_cached(
        "SELECT d.articulo_id, a.nombre, d.cantidad, u.abreviatura
         FROM detalle_gasto_administrativo d
         JOIN articulos a ON a.id = d.articulo_id
         JOIN unidades_medida u ON u.id = a.unidad_medida_id
         WHERE d.gasto_id = ?1 ORDER BY d.id",
    )?;
    gasto.detalles = stmt
        .query_map(rusqlite::params![gasto.id], |row| {
            Ok(DetalleConsumo {
                articulo_id: row.get(0)?,
                articulo: row.get(1)?,
                cantidad: row.get(2)?,
                unidad: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(())
}

pub fn listar_consumos(
    db: &Database,
    busqueda: Option<&str>,
    pagina: i64,
) -> Result<Pagina<GastoAdministrativo>, AppError> {
    let conn = db.conn.lock()?;
    let patron = busqueda.map(|b| format!("%{}%", b));

    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM gastos_administrativos WHERE ?1 IS NULL OR descripcion LIKE ?1",
        rusqlite::params![patron],
        |row| row.get(0),
    )?;

    paginar(
        |limite, offset| {
            let mut stmt = conn.prepare(&format!(
                "{} WHERE ?1 IS NULL OR g.descripcion LIKE ?1
                 ORDER BY g.created_at DESC, g.id DESC LIMIT {} OFFSET {}",
                SELECT_CONSUMO, limite, offset
            ))?;
            let mut items = stmt
                .query_map(rusqlite::params![patron], mapear)?
                .collect::<Result<Vec<_>, _>>()?;
            for gasto in items.iter_mut() {
                cargar_detalles(&conn, gasto)?;
            }
            Ok(items)
        },
        total,
        pagina,
        POR_PAGINA,
    )
}

pub fn obtener_consumo(db: &Database, id: i64) -> Result<GastoAdministrativo, AppError> {
    let conn = db.conn.lock()?;
    let mut gasto = conn
        .query_row(
            &format!("{} WHERE g.id = ?1", SELECT_CONSUMO),
            rusqlite::params![id],
            mapear,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                AppError::NoEncontrado("Gasto administrativo no encontrado".into())
            }
            e => e.into(),
        })?;
    cargar_detalles(&conn, &mut gasto)?;
    Ok(gasto)
}

/// Devuelve las cantidades anteriores y aplica las nuevas
pub fn editar_consumo(
    db: &Database,
    sesion: &SesionActiva,
    id: i64,
    datos: &NuevoGastoAdministrativo,
) -> Result<(), AppError> {
    let descripcion = validar(datos)?;
    let mut conn = db.conn.lock()?;
    let ahora = db.ahora();
    let tx = conn.transaction()?;

    if estado(&tx, id)? != GASTO_CONSOLIDADO {
        return Err(AppError::Conflicto("Solo se editan gastos consolidados".into()));
    }
    let anteriores = lineas_actuales(&tx, id)?;
    devolver_stock(&tx, &anteriores, &ahora)?;
    descontar_stock(&tx, &datos.lineas, &ahora)?;

    tx.execute(
        "DELETE FROM detalle_gasto_administrativo WHERE gasto_id = ?1",
        rusqlite::params![id],
    )?;
    insertar_lineas(&tx, id, &datos.lineas)?;
    tx.execute(
        "UPDATE gastos_administrativos SET descripcion = ?1, updated_at = ?2 WHERE id = ?3",
        rusqlite::params![descripcion, ahora, id],
    )?;
    registrar(
        &tx,
        "MODIFICAR",
        "gastos_administrativos",
        &id.to_string(),
        &format!("Gasto administrativo modificado: {}", descripcion),
        sesion.usuario_id,
        &ahora,
    )?;
    tx.commit()?;
    info!(consumo_id = id, "internal consumption edited");
    Ok(())
}

/// Admin o Supervisor. Restaura el stock consumido.
pub fn anular_consumo(db: &Database, sesion: &SesionActiva, id: i64) -> Result<(), AppError> {
    verificar_supervisor(sesion)?;
    let mut conn = db.conn.lock()?;
    let ahora = db.ahora();
    let tx = conn.transaction()?;

    if estado(&tx, id)? == GASTO_ANULADO {
        return Err(AppError::Conflicto("El gasto ya esta anulado".into()));
    }
    let lineas = lineas_actuales(&tx, id)?;
    devolver_stock(&tx, &lineas, &ahora)?;
    tx.execute(
        "UPDATE gastos_administrativos SET estado = ?1, updated_at = ?2 WHERE id = ?3",
        rusqlite::params![GASTO_ANULADO, ahora, id],
    )?;
    registrar(
        &tx,
        "ANULAR",
        "gastos_administrativos",
        &id.to_string(),
        "Gasto administrativo anulado",
        sesion.usuario_id,
        &ahora,
    )?;
    tx.commit()?;
    info!(consumo_id = id, "internal consumption voided");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::pruebas;

    fn consumo(articulo_id: i64, cantidad: f64) -> NuevoGastoAdministrativo {
        NuevoGastoAdministrativo {
            descripcion: "Aseo general".into(),
            lineas: vec![LineaInsumo {
                articulo_id,
                cantidad,
            }],
        }
    }

    #[test]
    fn test_crear_descuenta_stock() {
        let db = Database::en_memoria().unwrap();
        let articulo = pruebas::articulo(&db, "ALGODON", 10.0);
        let id = crear_consumo(&db, &pruebas::empleado(), &consumo(articulo, 2.5)).unwrap();

        assert!((pruebas::stock(&db, articulo) - 7.5).abs() < 1e-9);
        let gasto = obtener_consumo(&db, id).unwrap();
        assert_eq!(gasto.detalles[0].unidad, "und");
        assert_eq!(listar_consumos(&db, Some("aseo"), 1).unwrap().total, 1);
    }

    #[test]
    fn test_stock_insuficiente() {
        let db = Database::en_memoria().unwrap();
        let articulo = pruebas::articulo(&db, "ALGODON", 1.0);
        assert!(matches!(
            crear_consumo(&db, &pruebas::empleado(), &consumo(articulo, 2.0)),
            Err(AppError::Validacion(_))
        ));
        assert_eq!(pruebas::contar(&db, "SELECT COUNT(*) FROM gastos_administrativos"), 0);
    }

    #[test]
    fn test_editar_usa_stock_devuelto() {
        let db = Database::en_memoria().unwrap();
        let articulo = pruebas::articulo(&db, "ALGODON", 4.0);
        let id = crear_consumo(&db, &pruebas::empleado(), &consumo(articulo, 3.0)).unwrap();

        // Con 1 disponible, pedir 4 solo es posible si se devuelven los 3 anteriores
        editar_consumo(&db, &pruebas::empleado(), id, &consumo(articulo, 4.0)).unwrap();
        assert_eq!(pruebas::stock(&db, articulo), 0.0);
        assert!(editar_consumo(&db, &pruebas::empleado(), id, &consumo(articulo, 5.0)).is_err());
        assert_eq!(pruebas::stock(&db, articulo), 0.0);
    }

    #[test]
    fn test_anular_restaura_stock() {
        let db = Database::en_memoria().unwrap();
        let articulo = pruebas::articulo(&db, "ALGODON", 4.0);
        let id = crear_consumo(&db, &pruebas::empleado(), &consumo(articulo, 3.0)).unwrap();

        assert!(matches!(
            anular_consumo(&db, &pruebas::empleado(), id),
            Err(AppError::NoAutorizado)
        ));
        anular_consumo(&db, &pruebas::sesion(crate::models::Rol::Supervisor), id).unwrap();
        assert_eq!(pruebas::stock(&db, articulo), 4.0);
        assert!(matches!(
            anular_consumo(&db, &pruebas::admin(), id),
            Err(AppError::Conflicto(_))
        ));
    }

    #[test]
    fn test_cantidad_no_finita_es_invalida() {
        let db = Database::en_memoria().unwrap();
        let articulo = pruebas::articulo(&db, "ALGODON", 10.0);
        for cantidad in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
            assert!(matches!(
                crear_consumo(&db, &pruebas::empleado(), &consumo(articulo, cantidad)),
                Err(AppError::Validacion(_))
            ));
        }
        assert_eq!(pruebas::stock(&db, articulo), 10.0);
    }
}
