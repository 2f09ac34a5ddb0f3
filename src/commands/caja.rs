use rusqlite::Connection;
use tracing::{info, warn};

use super::auditoria::registrar;
use super::verificar_admin;
use crate::db::Database;
use crate::error::{es_restriccion, AppError};
use crate::models::{
    CierreCaja, NuevoCierre, SesionActiva, TotalesDia, CIERRE_ANULADO, CIERRE_CONSOLIDADO,
    DENOMINACIONES,
};
use crate::utils;

/// Lo que se muestra en la pantalla de cierre para una fecha
#[derive(Debug)]
pub enum EstadoCierre {
    Consolidado(CierreCaja),
    Pendiente(TotalesDia),
    SinMovimientos(String),
}

/// Totales del dia a partir de los pagos de servicios realizados y los vales
pub fn calcular_totales(conn: &Connection, fecha: &str) -> Result<TotalesDia, AppError> {
    let mut totales = TotalesDia {
        fecha: fecha.to_string(),
        ..Default::default()
    };

    let mut stmt = conn.prepare(
        "SELECT f.nombre, COALESCE(SUM(pa.monto), 0)
         FROM pagos_actividad pa
         JOIN actividades a ON a.id = pa.actividad_id
         JOIN formas_pago f ON f.id = pa.forma_pago_id
         WHERE a.estado = 'Realizada' AND date(a.created_at) = date(?1)
         GROUP BY f.nombre",
    )?;
    let por_forma = stmt
        .query_map(rusqlite::params![fecha], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    for (forma, monto) in por_forma {
        match forma.as_str() {
            "Efectivo" => totales.total_efectivo += monto,
            "Datafono" => totales.total_datafono += monto,
            "Transferencia" => totales.total_transferencia += monto,
            otra => warn!(forma = otra, "unknown payment method ignored in totals"),
        }
    }

    let (num_actividades, total_vales, num_vales): (i64, f64, i64) = conn.query_row(
        "SELECT COUNT(procedimiento_id),
                COALESCE(SUM(CASE WHEN procedimiento_id IS NULL THEN vales END), 0),
                COUNT(CASE WHEN procedimiento_id IS NULL AND vales > 0 THEN 1 END)
         FROM actividades
         WHERE estado = 'Realizada' AND date(created_at) = date(?1)",
        rusqlite::params![fecha],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;

    totales.num_actividades = num_actividades;
    totales.total_vales = total_vales;
    totales.num_vales = num_vales;
    totales.total_ventas_dia =
        totales.total_efectivo + totales.total_datafono + totales.total_transferencia;
    totales.total_efectivo_sistema = totales.total_efectivo - totales.total_vales;
    Ok(totales)
}

const SELECT_CIERRE: &str = "SELECT c.id, c.fecha, c.total_efectivo, c.total_datafono,
            c.total_transferencia, c.total_vales, c.total_ventas_dia,
            c.total_efectivo_sistema, c.total_efectivo_contado, c.descuadre,
            c.desglose_efectivo, c.observaciones, c.estado, u.nombre, c.created_at
     FROM cierres_caja c JOIN usuarios u ON u.id = c.usuario_id";

fn mapear(row: &rusqlite::Row) -> rusqlite::Result<CierreCaja> {
    let desglose: Option<String> = row.get(10)?;
    Ok(CierreCaja {
        id: row.get(0)?,
        fecha: row.get(1)?,
        total_efectivo: row.get(2)?,
        total_datafono: row.get(3)?,
        total_transferencia: row.get(4)?,
        total_vales: row.get(5)?,
        total_ventas_dia: row.get(6)?,
        total_efectivo_sistema: row.get(7)?,
        total_efectivo_contado: row.get(8)?,
        descuadre: row.get(9)?,
        desglose_efectivo: desglose.and_then(|d| serde_json::from_str(&d).ok()),
        observaciones: row.get(11)?,
        estado: row.get(12)?,
        usuario: row.get(13)?,
        created_at: row.get(14)?,
    })
}

fn cierre_consolidado(conn: &Connection, fecha: &str) -> Result<Option<CierreCaja>, AppError> {
    match conn.query_row(
        &format!("{} WHERE c.fecha = ?1 AND c.estado = ?2", SELECT_CIERRE),
        rusqlite::params![fecha, CIERRE_CONSOLIDADO],
        mapear,
    ) {
        Ok(cierre) => Ok(Some(cierre)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn fecha_valida(db: &Database, fecha: Option<&str>) -> Result<String, AppError> {
    match fecha.map(str::trim).filter(|f| !f.is_empty()) {
        None => Ok(db.hoy().format("%Y-%m-%d").to_string()),
        Some(texto) => utils::parse_fecha(texto)
            .map(|f| f.format("%Y-%m-%d").to_string())
            .ok_or_else(|| AppError::validacion("La Fecha no es valida")),
    }
}

/// Cierre existente del dia, o los totales calculados si aun no se ha cerrado
pub fn mostrar_cierre(db: &Database, fecha: Option<&str>) -> Result<EstadoCierre, AppError> {
    let fecha = fecha_valida(db, fecha)?;
    let conn = db.conn.lock()?;
    if let Some(cierre) = cierre_consolidado(&conn, &fecha)? {
        return Ok(EstadoCierre::Consolidado(cierre));
    }
    let totales = calcular_totales(&conn, &fecha)?;
    if totales.num_actividades == 0 && totales.num_vales == 0 {
        return Ok(EstadoCierre::SinMovimientos(fecha));
    }
    Ok(EstadoCierre::Pendiente(totales))
}

/// Valor total de un conteo por denominacion; None si desborda
pub fn valor_desglose(desglose: &[(i64, i64)]) -> Option<i64> {
    desglose.iter().try_fold(0i64, |suma, &(denominacion, cantidad)| {
        denominacion.checked_mul(cantidad)?.checked_add(suma)
    })
}

/// Valida el desglose y lo convierte a objeto JSON denominacion -> cantidad
fn desglose_json(
    desglose: &[(i64, i64)],
    contado: f64,
    errores: &mut Vec<String>,
) -> Option<String> {
    let mut mapa = serde_json::Map::new();
    let mut validos = Vec::new();
    for &(denominacion, cantidad) in desglose {
        if !DENOMINACIONES.contains(&denominacion) {
            errores.push(format!("Denominacion no valida: {}", denominacion));
            continue;
        }
        if cantidad < 0 {
            errores.push("Las cantidades del desglose no pueden ser negativas".to_string());
            continue;
        }
        if cantidad > 0 {
            validos.push((denominacion, cantidad));
            mapa.insert(denominacion.to_string(), serde_json::Value::from(cantidad));
        }
    }
    let Some(suma) = valor_desglose(&validos) else {
        errores.push("El desglose excede el valor permitido".to_string());
        return None;
    };
    if !utils::montos_iguales(suma as f64, contado) {
        errores.push(format!(
            "El desglose ({}) no coincide con el efectivo contado ({})",
            utils::formatear_moneda(suma as f64),
            utils::formatear_moneda(contado)
        ));
    }
    Some(serde_json::Value::Object(mapa).to_string())
}

/// Consolida el cierre del dia. Los totales se recalculan aqui.
pub fn guardar_cierre(
    db: &Database,
    sesion: &SesionActiva,
    datos: &NuevoCierre,
) -> Result<i64, AppError> {
    let fecha = fecha_valida(db, Some(&datos.fecha))?;
    let mut errores = Vec::new();
    if datos.total_efectivo_contado < 0.0 || !datos.total_efectivo_contado.is_finite() {
        errores.push("El Efectivo contado no es valido".to_string());
    }
    let desglose = datos
        .desglose
        .as_deref()
        .filter(|d| !d.is_empty())
        .and_then(|d| desglose_json(d, datos.total_efectivo_contado, &mut errores));
    if !errores.is_empty() {
        return Err(AppError::Validacion(errores));
    }

    let mut conn = db.conn.lock()?;
    let ahora = db.ahora();
    let tx = conn.transaction()?;

    if cierre_consolidado(&tx, &fecha)?.is_some() {
        warn!(fecha = %fecha, "duplicate cash closing rejected");
        return Err(AppError::Conflicto(format!(
            "Ya existe un cierre consolidado para el {}",
            fecha
        )));
    }
    let totales = calcular_totales(&tx, &fecha)?;
    if totales.num_actividades == 0 && totales.num_vales == 0 {
        return Err(AppError::validacion("No hay actividades ni vales para cerrar"));
    }
    let descuadre = datos.total_efectivo_contado - totales.total_efectivo_sistema;

    let insertado = tx.execute(
        "INSERT INTO cierres_caja (fecha, total_efectivo, total_datafono, total_transferencia,
            total_vales, total_ventas_dia, total_efectivo_sistema, total_efectivo_contado,
            descuadre, desglose_efectivo, observaciones, estado, usuario_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14)",
        rusqlite::params![
            fecha,
            totales.total_efectivo,
            totales.total_datafono,
            totales.total_transferencia,
            totales.total_vales,
            totales.total_ventas_dia,
            totales.total_efectivo_sistema,
            datos.total_efectivo_contado,
            descuadre,
            desglose,
            utils::limpiar(datos.observaciones.as_deref()),
            CIERRE_CONSOLIDADO,
            sesion.usuario_id,
            ahora,
        ],
    );
    match insertado {
        Ok(_) => {}
        Err(e) if es_restriccion(&e) => {
            return Err(AppError::Conflicto(format!(
                "Ya existe un cierre consolidado para el {}",
                fecha
            )))
        }
        Err(e) => return Err(e.into()),
    }
    let id = tx.last_insert_rowid();
    registrar(
        &tx,
        "CREAR",
        "cierres_caja",
        &id.to_string(),
        &format!(
            "Cierre de caja del {} con descuadre de {}",
            fecha,
            utils::formatear_moneda(descuadre)
        ),
        sesion.usuario_id,
        &ahora,
    )?;
    tx.commit()?;
    info!(cierre_id = id, fecha = %fecha, descuadre, "cash closing saved");
    Ok(id)
}

pub fn historial_cierres(db: &Database) -> Result<Vec<CierreCaja>, AppError> {
    let conn = db.conn.lock()?;
    let mut stmt = conn.prepare(&format!(
        "{} ORDER BY c.fecha DESC, c.id DESC",
        SELECT_CIERRE
    ))?;
    let cierres = stmt
        .query_map([], mapear)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(cierres)
}

pub fn obtener_cierre(db: &Database, id: i64) -> Result<CierreCaja, AppError> {
    let conn = db.conn.lock()?;
    conn.query_row(
        &format!("{} WHERE c.id = ?1", SELECT_CIERRE),
        rusqlite::params![id],
        mapear,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => AppError::NoEncontrado("Cierre no encontrado".into()),
        e => e.into(),
    })
}

pub fn anular_cierre(db: &Database, sesion: &SesionActiva, id: i64) -> Result<(), AppError> {
    verificar_admin(sesion)?;
    let mut conn = db.conn.lock()?;
    let ahora = db.ahora();
    let tx = conn.transaction()?;

    let (fecha, estado): (String, String) = tx
        .query_row(
            "SELECT fecha, estado FROM cierres_caja WHERE id = ?1",
            rusqlite::params![id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                AppError::NoEncontrado("Cierre no encontrado".into())
            }
            e => e.into(),
        })?;
    if estado == CIERRE_ANULADO {
        return Err(AppError::Conflicto("El cierre ya esta anulado".into()));
    }

    tx.execute(
        "UPDATE cierres_caja SET estado = ?1, updated_at = ?2 WHERE id = ?3",
        rusqlite::params![CIERRE_ANULADO, ahora, id],
    )?;
    registrar(
        &tx,
        "ANULAR",
        "cierres_caja",
        &id.to_string(),
        &format!("Cierre de caja del {} anulado", fecha),
        sesion.usuario_id,
        &ahora,
    )?;
    tx.commit()?;
    info!(cierre_id = id, "cash closing voided");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{actividades, pruebas};
    use crate::models::{NuevaActividad, NuevoPago};

    /// Servicio de 30.000 (10.000 efectivo + 20.000 transferencia) y un vale de 4.000
    fn dia_con_movimientos() -> (Database, String) {
        let db = Database::en_memoria().unwrap();
        let personal = pruebas::personal(&db, "SOFIA", "sofia@spa.co");
        let cliente = pruebas::cliente(&db, "ANA", "1010");
        let (procedimiento, _) = pruebas::procedimiento(&db, "MANICURA", 30000.0);
        let efectivo = pruebas::forma_pago(&db, "Efectivo");
        let transferencia = pruebas::forma_pago(&db, "Transferencia");
        let admin = pruebas::admin();

        actividades::crear_actividad(
            &db,
            &admin,
            &NuevaActividad {
                personal_id: Some(personal),
                cliente_id: Some(cliente),
                procedimiento_id: Some(procedimiento),
                pagos: vec![
                    NuevoPago {
                        forma_pago_id: efectivo,
                        banco_id: None,
                        monto: 10000.0,
                        referencia_pago: None,
                    },
                    NuevoPago {
                        forma_pago_id: transferencia,
                        banco_id: None,
                        monto: 20000.0,
                        referencia_pago: Some("TRX-9".into()),
                    },
                ],
                ..Default::default()
            },
        )
        .unwrap();
        actividades::crear_actividad(
            &db,
            &admin,
            &NuevaActividad {
                personal_id: Some(personal),
                vales: 4000.0,
                descripcion: Some("Transporte".into()),
                ..Default::default()
            },
        )
        .unwrap();
        let hoy = db.hoy().format("%Y-%m-%d").to_string();
        (db, hoy)
    }

    #[test]
    fn test_totales_del_dia() {
        let (db, hoy) = dia_con_movimientos();
        match mostrar_cierre(&db, None).unwrap() {
            EstadoCierre::Pendiente(t) => {
                assert_eq!(t.fecha, hoy);
                assert_eq!(t.total_efectivo, 10000.0);
                assert_eq!(t.total_transferencia, 20000.0);
                assert_eq!(t.total_datafono, 0.0);
                assert_eq!(t.total_vales, 4000.0);
                assert_eq!(t.total_ventas_dia, 30000.0);
                assert_eq!(t.total_efectivo_sistema, 6000.0);
                assert_eq!(t.num_actividades, 1);
                assert_eq!(t.num_vales, 1);
            }
            otro => panic!("estado inesperado: {otro:?}"),
        }
    }

    #[test]
    fn test_vale_anulado_no_descuenta_efectivo() {
        let (db, _) = dia_con_movimientos();
        let vale_id: String = db
            .conn
            .lock()
            .unwrap()
            .query_row("SELECT id FROM actividades WHERE vales > 0", [], |r| r.get(0))
            .unwrap();
        actividades::anular_actividad(&db, &pruebas::admin(), &vale_id).unwrap();

        match mostrar_cierre(&db, None).unwrap() {
            EstadoCierre::Pendiente(t) => {
                assert_eq!(t.total_vales, 0.0);
                assert_eq!(t.num_vales, 0);
                assert_eq!(t.total_efectivo_sistema, 10000.0);
            }
            otro => panic!("estado inesperado: {otro:?}"),
        }
    }

    #[test]
    fn test_dia_sin_movimientos() {
        let db = Database::en_memoria().unwrap();
        assert!(matches!(
            mostrar_cierre(&db, Some("2026-02-01")).unwrap(),
            EstadoCierre::SinMovimientos(f) if f == "2026-02-01"
        ));
        assert!(mostrar_cierre(&db, Some("ayer")).is_err());
    }

    #[test]
    fn test_guardar_calcula_descuadre_y_es_unico() {
        let (db, hoy) = dia_con_movimientos();
        let datos = NuevoCierre {
            fecha: hoy.clone(),
            total_efectivo_contado: 5000.0,
            desglose: Some(vec![(2000, 2), (1000, 1), (500, 0)]),
            observaciones: Some("Faltan mil".into()),
        };
        let id = guardar_cierre(&db, &pruebas::admin(), &datos).unwrap();
        let cierre = obtener_cierre(&db, id).unwrap();
        assert_eq!(cierre.descuadre, -1000.0);
        assert_eq!(cierre.desglose_efectivo, Some(serde_json::json!({"2000": 2, "1000": 1})));

        assert!(matches!(
            mostrar_cierre(&db, Some(&hoy)).unwrap(),
            EstadoCierre::Consolidado(_)
        ));
        assert!(matches!(
            guardar_cierre(&db, &pruebas::admin(), &datos),
            Err(AppError::Conflicto(_))
        ));
        assert_eq!(
            pruebas::contar(&db, "SELECT COUNT(*) FROM auditoria WHERE tabla_afectada = 'cierres_caja'"),
            1
        );
    }

    #[test]
    fn test_desglose_debe_cuadrar() {
        let (db, hoy) = dia_con_movimientos();
        let datos = NuevoCierre {
            fecha: hoy,
            total_efectivo_contado: 6000.0,
            desglose: Some(vec![(5000, 1), (300, 1)]),
            observaciones: None,
        };
        match guardar_cierre(&db, &pruebas::admin(), &datos).unwrap_err() {
            AppError::Validacion(errores) => assert_eq!(errores.len(), 2),
            otro => panic!("error inesperado: {otro:?}"),
        }
    }

    #[test]
    fn test_anular_permite_cerrar_de_nuevo() {
        let (db, hoy) = dia_con_movimientos();
        let datos = NuevoCierre {
            fecha: hoy.clone(),
            total_efectivo_contado: 6000.0,
            ..Default::default()
        };
        let id = guardar_cierre(&db, &pruebas::admin(), &datos).unwrap();
        assert!(matches!(
            anular_cierre(&db, &pruebas::empleado(), id),
            Err(AppError::NoAutorizado)
        ));
        anular_cierre(&db, &pruebas::admin(), id).unwrap();
        assert!(matches!(
            anular_cierre(&db, &pruebas::admin(), id),
            Err(AppError::Conflicto(_))
        ));
        guardar_cierre(&db, &pruebas::admin(), &datos).unwrap();
        assert_eq!(historial_cierres(&db).unwrap().len(), 2);
    }

    #[test]
    fn test_contado_no_finito_es_invalido() {
        let (db, hoy) = dia_con_movimientos();
        for contado in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
            let datos = NuevoCierre {
                fecha: hoy.clone(),
                total_efectivo_contado: contado,
                ..Default::default()
            };
            assert!(matches!(
                guardar_cierre(&db, &pruebas::admin(), &datos),
                Err(AppError::Validacion(_))
            ));
        }
        assert_eq!(historial_cierres(&db).unwrap().len(), 0);
    }

    #[test]
    fn test_desglose_desbordado_es_invalido() {
        let (db, hoy) = dia_con_movimientos();
        let datos = NuevoCierre {
            fecha: hoy,
            total_efectivo_contado: 6000.0,
            desglose: Some(vec![(100_000, 1_000_000_000_000_000), (50_000, i64::MAX)]),
            observaciones: None,
        };
        match guardar_cierre(&db, &pruebas::admin(), &datos).unwrap_err() {
            AppError::Validacion(errores) => {
                assert!(errores.iter().any(|e| e.contains("excede")))
            }
            otro => panic!("error inesperado: {otro:?}"),
        }
        assert_eq!(valor_desglose(&[(2000, 2), (1000, 1)]), Some(5000));
        assert_eq!(valor_desglose(&[(100_000, i64::MAX)]), None);
    }
}
