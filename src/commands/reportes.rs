use chrono::{Datelike, Months, NaiveDate};

use super::verificar_supervisor;
use crate::db::Database;
use crate::error::AppError;
use crate::models::{ClienteFrecuente, GananciasPerdidas, Pagina, PagoPersonal, SesionActiva};
use crate::utils;

pub const PERSONAL_POR_PAGINA: i64 = 10;
pub const MAX_CLIENTES_FRECUENTES: i64 = 10;

/// Inicio por defecto de un rango cuando no se indica
#[derive(Debug, Clone, Copy)]
pub enum InicioPorDefecto {
    /// Primer dia del mes de la fecha final
    InicioDeMes,
    /// Un mes antes de la fecha final
    MesAnterior,
}

/// Rango de fechas (YYYY-MM-DD) con la fecha final por defecto en hoy
pub fn rango(
    db: &Database,
    fecha_inicio: Option<&str>,
    fecha_fin: Option<&str>,
    por_defecto: InicioPorDefecto,
) -> (String, String) {
    let fin = fecha_fin
        .and_then(utils::parse_fecha)
        .unwrap_or_else(|| db.hoy());
    let inicio = fecha_inicio
        .and_then(utils::parse_fecha)
        .unwrap_or_else(|| match por_defecto {
            InicioPorDefecto::InicioDeMes => fin.with_day(1).unwrap_or(fin),
            InicioPorDefecto::MesAnterior => fin.checked_sub_months(Months::new(1)).unwrap_or(fin),
        });
    (texto(inicio), texto(fin))
}

fn texto(fecha: NaiveDate) -> String {
    fecha.format("%Y-%m-%d").to_string()
}

pub fn ganancias_perdidas(
    db: &Database,
    sesion: &SesionActiva,
    fecha_inicio: &str,
    fecha_fin: &str,
) -> Result<GananciasPerdidas, AppError> {
    verificar_supervisor(sesion)?;
    let conn = db.conn.lock()?;

    let ingresos: f64 = conn.query_row(
        "SELECT COALESCE(SUM(pc.monto), 0)
         FROM actividades a JOIN precios pc ON pc.id = a.precio_id
         WHERE a.estado = 'Realizada' AND a.procedimiento_id IS NOT NULL
           AND date(a.created_at) BETWEEN date(?1) AND date(?2)",
        rusqlite::params![fecha_inicio, fecha_fin],
        |row| row.get(0),
    )?;
    let gastos_compras: f64 = conn.query_row(
        "SELECT COALESCE(SUM(valor_total), 0) FROM gastos_adicionales
         WHERE estado = 'Consolidado' AND fecha_gasto BETWEEN date(?1) AND date(?2)",
        rusqlite::params![fecha_inicio, fecha_fin],
        |row| row.get(0),
    )?;
    let gastos_consumo: f64 = conn.query_row(
        "SELECT COALESCE(SUM(d.cantidad * a.costo_unitario), 0)
         FROM detalle_gasto_administrativo d
         JOIN gastos_administrativos g ON g.id = d.gasto_id
         JOIN articulos a ON a.id = d.articulo_id
         WHERE g.estado != 'Anulado' AND date(g.created_at) BETWEEN date(?1) AND date(?2)",
        rusqlite::params![fecha_inicio, fecha_fin],
        |row| row.get(0),
    )?;

    let total_gastos = gastos_compras + gastos_consumo;
    Ok(GananciasPerdidas {
        fecha_inicio: fecha_inicio.to_string(),
        fecha_fin: fecha_fin.to_string(),
        ingresos,
        gastos_compras,
        gastos_consumo,
        total_gastos,
        utilidad: ingresos - total_gastos,
    })
}

/// Rendimiento por personal, de mayor a menor facturacion
pub fn reporte_personal(
    db: &Database,
    sesion: &SesionActiva,
    fecha_inicio: &str,
    fecha_fin: &str,
    pagina: i64,
) -> Result<Pagina<PagoPersonal>, AppError> {
    verificar_supervisor(sesion)?;
    let conn = db.conn.lock()?;

    let total: i64 = conn.query_row(
        "SELECT COUNT(DISTINCT personal_id) FROM actividades
         WHERE estado = 'Realizada' AND date(created_at) BETWEEN date(?1) AND date(?2)",
        rusqlite::params![fecha_inicio, fecha_fin],
        |row| row.get(0),
    )?;

    super::paginar(
        |limite, offset| {
            let mut stmt = conn.prepare(&format!(
                "SELECT p.id, p.nombre || ' ' || p.apellidos, p.porcentaje_comision,
                        COUNT(a.procedimiento_id),
                        COALESCE(SUM(CASE WHEN a.procedimiento_id IS NOT NULL THEN pc.monto END), 0) AS facturado,
                        COALESCE(SUM(a.vales), 0)
                 FROM actividades a
                 JOIN personal p ON p.id = a.personal_id
                 LEFT JOIN precios pc ON pc.id = a.precio_id
                 WHERE a.estado = 'Realizada' AND date(a.created_at) BETWEEN date(?1) AND date(?2)
                 GROUP BY p.id
                 ORDER BY facturado DESC, p.nombre
                 LIMIT {} OFFSET {}",
                limite, offset
            ))?;
            let items = stmt
                .query_map(rusqlite::params![fecha_inicio, fecha_fin], |row| {
                    let porcentaje: f64 = row.get(2)?;
                    let total_facturado: f64 = row.get(4)?;
                    let vales: f64 = row.get(5)?;
                    let ganancia = total_facturado * porcentaje / 100.0;
                    Ok(PagoPersonal {
                        personal_id: row.get(0)?,
                        personal: row.get(1)?,
                        porcentaje,
                        servicios: row.get(3)?,
                        total_facturado,
                        ganancia,
                        vales,
                        neto: ganancia - vales,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(items)
        },
        total,
        pagina,
        PERSONAL_POR_PAGINA,
    )
}

pub fn clientes_frecuentes(
    db: &Database,
    sesion: &SesionActiva,
    fecha_inicio: &str,
    fecha_fin: &str,
) -> Result<Vec<ClienteFrecuente>, AppError> {
    verificar_supervisor(sesion)?;
    let conn = db.conn.lock()?;
    let mut stmt = conn.prepare(
        "SELECT c.id, c.nombre || ' ' || c.apellidos, COUNT(a.id), COALESCE(SUM(pc.monto), 0) AS facturado
         FROM actividades a
         JOIN clientes c ON c.id = a.cliente_id
         JOIN precios pc ON pc.id = a.precio_id
         WHERE a.estado = 'Realizada' AND date(a.created_at) BETWEEN date(?1) AND date(?2)
         GROUP BY c.id
         ORDER BY facturado DESC, COUNT(a.id) DESC
         LIMIT ?3",
    )?;
    let clientes = stmt
        .query_map(
            rusqlite::params![fecha_inicio, fecha_fin, MAX_CLIENTES_FRECUENTES],
            |row| {
                Ok(ClienteFrecuente {
                    cliente_id: row.get(0)?,
                    cliente: row.get(1)?,
                    visitas: row.get(2)?,
                    total_facturado: row.get(3)?,
                })
            },
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(clientes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{actividades, consumos, gastos, pruebas};
    use crate::models::{
        LineaCompra, LineaInsumo, NuevaActividad, NuevoGastoAdicional, NuevoGastoAdministrativo,
        NuevoPago,
    };

    fn hoy(db: &Database) -> String {
        texto(db.hoy())
    }

    fn servicio(db: &Database, personal: i64, cliente: i64, procedimiento: i64, monto: f64) {
        actividades::crear_actividad(
            db,
            &pruebas::admin(),
            &NuevaActividad {
                personal_id: Some(personal),
                cliente_id: Some(cliente),
                procedimiento_id: Some(procedimiento),
                pagos: vec![NuevoPago {
                    forma_pago_id: pruebas::forma_pago(db, "Efectivo"),
                    banco_id: None,
                    monto,
                    referencia_pago: None,
                }],
                ..Default::default()
            },
        )
        .unwrap();
    }

    #[test]
    fn test_rango_por_defecto() {
        let db = Database::en_memoria().unwrap();
        let (inicio, fin) = rango(&db, None, Some("2026-03-15"), InicioPorDefecto::InicioDeMes);
        assert_eq!((inicio.as_str(), fin.as_str()), ("2026-03-01", "2026-03-15"));
        let (inicio, _) = rango(&db, None, Some("2026-03-31"), InicioPorDefecto::MesAnterior);
        assert_eq!(inicio, "2026-02-28");
        let (inicio, _) = rango(&db, Some("2026-01-05"), Some("2026-03-31"), InicioPorDefecto::MesAnterior);
        assert_eq!(inicio, "2026-01-05");
    }

    #[test]
    fn test_ganancias_y_perdidas() {
        let db = Database::en_memoria().unwrap();
        let personal = pruebas::personal(&db, "SOFIA", "sofia@spa.co");
        let cliente = pruebas::cliente(&db, "ANA", "1010");
        let (procedimiento, _) = pruebas::procedimiento(&db, "MANICURA", 30000.0);
        servicio(&db, personal, cliente, procedimiento, 30000.0);

        let proveedor = pruebas::proveedor(&db, "DISTRIBUIDORA", "900");
        let articulo = pruebas::articulo(&db, "ACETONA", 0.0);
        gastos::crear_gasto(
            &db,
            &pruebas::admin(),
            &NuevoGastoAdicional {
                numero_factura: "A-1".into(),
                proveedor_id: Some(proveedor),
                fecha_gasto: hoy(&db),
                descripcion: None,
                lineas: vec![LineaCompra {
                    articulo_id: articulo,
                    cantidad: 4.0,
                    precio_unitario: 2000.0,
                }],
            },
        )
        .unwrap();
        consumos::crear_consumo(
            &db,
            &pruebas::admin(),
            &NuevoGastoAdministrativo {
                descripcion: "Limpieza".into(),
                lineas: vec![LineaInsumo {
                    articulo_id: articulo,
                    cantidad: 1.0,
                }],
            },
        )
        .unwrap();

        let r = ganancias_perdidas(&db, &pruebas::admin(), &hoy(&db), &hoy(&db)).unwrap();
        assert_eq!(r.ingresos, 30000.0);
        assert_eq!(r.gastos_compras, 8000.0);
        assert_eq!(r.gastos_consumo, 2000.0);
        assert_eq!(r.utilidad, 20000.0);

        assert!(matches!(
            ganancias_perdidas(&db, &pruebas::empleado(), &hoy(&db), &hoy(&db)),
            Err(AppError::NoAutorizado)
        ));
    }

    #[test]
    fn test_personal_y_clientes_ordenados_por_facturacion() {
        let db = Database::en_memoria().unwrap();
        let sofia = pruebas::personal(&db, "SOFIA", "sofia@spa.co");
        let laura = pruebas::personal(&db, "LAURA", "laura@spa.co");
        let ana = pruebas::cliente(&db, "ANA", "1");
        let eva = pruebas::cliente(&db, "EVA", "2");
        let (manicura, _) = pruebas::procedimiento(&db, "MANICURA", 20000.0);
        let (spa, _) = pruebas::procedimiento(&db, "SPA DE PIES", 50000.0);
        servicio(&db, sofia, ana, manicura, 20000.0);
        servicio(&db, sofia, ana, manicura, 20000.0);
        servicio(&db, laura, eva, spa, 50000.0);

        let hoy = hoy(&db);
        let pagina = reporte_personal(&db, &pruebas::admin(), &hoy, &hoy, 1).unwrap();
        assert_eq!(pagina.total, 2);
        assert_eq!(pagina.items[0].personal, "LAURA PRUEBA");
        assert_eq!(pagina.items[1].servicios, 2);

        let clientes = clientes_frecuentes(&db, &pruebas::admin(), &hoy, &hoy).unwrap();
        assert_eq!(clientes[0].cliente, "EVA CLIENTE");
        assert_eq!(clientes[1].visitas, 2);
    }
}
