use chrono::{Datelike, Duration, Weekday};

use crate::db::Database;
use crate::error::AppError;
use crate::models::{Dashboard, VentaDiaria};

const DIAS_SERIE: i64 = 7;

fn dia_corto(dia: Weekday) -> &'static str {
    match dia {
        Weekday::Mon => "lun",
        Weekday::Tue => "mar",
        Weekday::Wed => "mié",
        Weekday::Thu => "jue",
        Weekday::Fri => "vie",
        Weekday::Sat => "sáb",
        Weekday::Sun => "dom",
    }
}

pub fn resumen(db: &Database) -> Result<Dashboard, AppError> {
    let hoy = db.hoy();
    let conn = db.conn.lock()?;
    let hoy_texto = hoy.format("%Y-%m-%d").to_string();

    let (ventas_hoy, clientes_atendidos, servicios_hoy, vales_hoy): (f64, i64, i64, f64) = conn
        .query_row(
            "SELECT COALESCE(SUM(CASE WHEN a.procedimiento_id IS NOT NULL THEN pc.monto END), 0),
                    COUNT(DISTINCT a.cliente_id),
                    COUNT(a.procedimiento_id),
                    COALESCE(SUM(CASE WHEN a.procedimiento_id IS NULL THEN a.vales END), 0)
             FROM actividades a LEFT JOIN precios pc ON pc.id = a.precio_id
             WHERE a.estado = 'Realizada' AND date(a.created_at) = date(?1)",
            rusqlite::params![hoy_texto],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )?;

    let desde = hoy - Duration::days(DIAS_SERIE - 1);
    let mut stmt = conn.prepare(
        "SELECT date(a.created_at) AS dia, SUM(pc.monto)
         FROM actividades a JOIN precios pc ON pc.id = a.precio_id
         WHERE a.estado = 'Realizada' AND a.procedimiento_id IS NOT NULL
           AND date(a.created_at) BETWEEN date(?1) AND date(?2)
         GROUP BY dia",
    )?;
    let por_dia = stmt
        .query_map(
            rusqlite::params![desde.format("%Y-%m-%d").to_string(), hoy_texto],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?)),
        )?
        .collect::<Result<std::collections::HashMap<_, _>, _>>()?;

    // Los dias sin ventas aparecen en cero
    let ultimos_dias = (0..DIAS_SERIE)
        .map(|i| {
            let dia = desde + Duration::days(i);
            let fecha = dia.format("%Y-%m-%d").to_string();
            VentaDiaria {
                etiqueta: format!("{} {}", dia_corto(dia.weekday()), dia.day()),
                total: por_dia.get(&fecha).copied().unwrap_or(0.0),
                fecha,
            }
        })
        .collect();

    Ok(Dashboard {
        ventas_hoy,
        clientes_atendidos,
        servicios_hoy,
        vales_hoy,
        ultimos_dias,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{actividades, pruebas};
    use crate::models::{NuevaActividad, NuevoPago};

    #[test]
    fn test_resumen_del_dia() {
        let db = Database::en_memoria().unwrap();
        let personal = pruebas::personal(&db, "SOFIA", "sofia@spa.co");
        let cliente = pruebas::cliente(&db, "ANA", "1010");
        let (procedimiento, _) = pruebas::procedimiento(&db, "MANICURA", 30000.0);
        for _ in 0..2 {
            actividades::crear_actividad(
                &db,
                &pruebas::admin(),
                &NuevaActividad {
                    personal_id: Some(personal),
                    cliente_id: Some(cliente),
                    procedimiento_id: Some(procedimiento),
                    pagos: vec![NuevoPago {
                        forma_pago_id: pruebas::forma_pago(&db, "Efectivo"),
                        banco_id: None,
                        monto: 30000.0,
                        referencia_pago: None,
                    }],
                    ..Default::default()
                },
            )
            .unwrap();
        }
        actividades::crear_actividad(
            &db,
            &pruebas::admin(),
            &NuevaActividad {
                personal_id: Some(personal),
                vales: 7000.0,
                descripcion: Some("Almuerzo".into()),
                ..Default::default()
            },
        )
        .unwrap();

        let d = resumen(&db).unwrap();
        assert_eq!(d.ventas_hoy, 60000.0);
        assert_eq!(d.clientes_atendidos, 1);
        assert_eq!(d.servicios_hoy, 2);
        assert_eq!(d.vales_hoy, 7000.0);
        assert_eq!(d.ultimos_dias.len(), 7);
        assert_eq!(d.ultimos_dias[6].total, 60000.0);
        assert_eq!(d.ultimos_dias[0].total, 0.0);
    }

    #[test]
    fn test_etiquetas() {
        assert_eq!(dia_corto(Weekday::Wed), "mié");
    }
}
