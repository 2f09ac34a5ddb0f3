use rusqlite::Connection;
use tracing::{info, warn};

use crate::db::Database;
use crate::error::AppError;
use crate::models::{Factura, SesionActiva, VerificacionFactura};

pub fn verificar_factura(db: &Database, actividad_id: &str) -> Result<VerificacionFactura, AppError> {
    let conn = db.conn.lock()?;
    let numero = numero_factura(&conn, actividad_id)?;
    Ok(VerificacionFactura {
        existe: numero.is_some(),
        actividad_id: actividad_id.to_string(),
        numero,
    })
}

fn numero_factura(conn: &Connection, actividad_id: &str) -> Result<Option<String>, AppError> {
    match conn.query_row(
        "SELECT numero FROM facturas WHERE actividad_id = ?1",
        rusqlite::params![actividad_id],
        |row| row.get::<_, String>(0),
    ) {
        Ok(numero) => Ok(Some(numero)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Siguiente consecutivo F-0001, F-0002, ...
fn siguiente_numero(conn: &Connection) -> Result<String, AppError> {
    let siguiente: i64 = conn.query_row(
        "SELECT COALESCE(MAX(CAST(SUBSTR(numero, 3) AS INTEGER)), 0) + 1 FROM facturas",
        [],
        |row| row.get(0),
    )?;
    Ok(format!("F-{:04}", siguiente))
}

/// Numera la factura de un servicio con cliente.
/// Conflicto si ya existe; NoEncontrado si la actividad no es facturable.
pub fn generar_factura(
    db: &Database,
    sesion: &SesionActiva,
    actividad_id: &str,
) -> Result<Factura, AppError> {
    let mut conn = db.conn.lock()?;
    let ahora = db.ahora();
    let tx = conn.transaction()?;

    if let Some(numero) = numero_factura(&tx, actividad_id)? {
        warn!(actividad_id, numero = %numero, "invoice already exists");
        return Err(AppError::Conflicto(format!(
            "La actividad ya tiene la factura {}",
            numero
        )));
    }

    let facturable = tx.query_row(
        "SELECT a.cliente_id, pc.monto
         FROM actividades a JOIN precios pc ON pc.id = a.precio_id
         WHERE a.id = ?1 AND a.estado = 'Realizada' AND a.cliente_id IS NOT NULL
           AND a.procedimiento_id IS NOT NULL",
        rusqlite::params![actividad_id],
        |row| Ok((row.get::<_, i64>(0)?, row.get::<_, f64>(1)?)),
    );
    let (cliente_id, total) = match facturable {
        Ok(fila) => fila,
        Err(rusqlite::Error::QueryReturnedNoRows) => {
            return Err(AppError::NoEncontrado(
                "Actividad no encontrada, anulada o sin cliente".into(),
            ))
        }
        Err(e) => return Err(e.into()),
    };

    let numero = siguiente_numero(&tx)?;
    tx.execute(
        "INSERT INTO facturas (numero, actividad_id, cliente_id, total, usuario_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![numero, actividad_id, cliente_id, total, sesion.usuario_id, ahora],
    )?;
    let factura = cargar_factura(&tx, actividad_id)?;
    tx.commit()?;

    info!(actividad_id, numero = %factura.numero, "invoice generated");
    Ok(factura)
}

/// Factura ya emitida, para reimprimir
pub fn obtener_factura(db: &Database, actividad_id: &str) -> Result<Factura, AppError> {
    let conn = db.conn.lock()?;
    cargar_factura(&conn, actividad_id)
}

fn cargar_factura(conn: &Connection, actividad_id: &str) -> Result<Factura, AppError> {
    let mut factura = conn
        .query_row(
            "SELECT f.id, f.numero, f.actividad_id, f.created_at,
                    c.nombre || ' ' || c.apellidos, c.cedula, c.telefono, c.email,
                    p.nombre || ' ' || p.apellidos, pr.nombre, f.total
             FROM facturas f
             JOIN actividades a ON a.id = f.actividad_id
             JOIN clientes c ON c.id = f.cliente_id
             JOIN personal p ON p.id = a.personal_id
             JOIN procedimientos pr ON pr.id = a.procedimiento_id
             WHERE f.actividad_id = ?1",
            rusqlite::params![actividad_id],
            |row| {
                Ok(Factura {
                    id: row.get(0)?,
                    numero: row.get(1)?,
                    actividad_id: row.get(2)?,
                    fecha: row.get(3)?,
                    cliente: row.get(4)?,
                    cedula: row.get(5)?,
                    telefono: row.get(6)?,
                    email: row.get(7)?,
                    personal: row.get(8)?,
                    procedimiento: row.get(9)?,
                    total: row.get(10)?,
                    pagos: Vec::new(),
                })
            },
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                AppError::NoEncontrado("La actividad no tiene factura".into())
            }
            e => e.into(),
        })?;

    let mut stmt = conn.prepare(
        "SELECT fp.nombre, pa.monto
         FROM pagos_actividad pa JOIN formas_pago fp ON fp.id = pa.forma_pago_id
         WHERE pa.actividad_id = ?1 ORDER BY pa.id",
    )?;
    factura.pagos = stmt
        .query_map(rusqlite::params![actividad_id], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(factura)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{actividades, pruebas};
    use crate::models::{NuevaActividad, NuevoPago};

    fn servicio(db: &Database, cedula: &str) -> String {
        let personal = pruebas::contar(db, "SELECT COALESCE(MAX(id), 0) FROM personal");
        let personal = if personal == 0 {
            pruebas::personal(db, "SOFIA", "sofia@spa.co")
        } else {
            personal
        };
        let cliente = pruebas::cliente(db, "ANA", cedula);
        let procedimiento = pruebas::contar(db, "SELECT COALESCE(MAX(id), 0) FROM procedimientos");
        let procedimiento = if procedimiento == 0 {
            pruebas::procedimiento(db, "MANICURA", 30000.0).0
        } else {
            procedimiento
        };
        actividades::crear_actividad(
            db,
            &pruebas::admin(),
            &NuevaActividad {
                personal_id: Some(personal),
                cliente_id: Some(cliente),
                procedimiento_id: Some(procedimiento),
                pagos: vec![NuevoPago {
                    forma_pago_id: pruebas::forma_pago(db, "Datafono"),
                    banco_id: None,
                    monto: 30000.0,
                    referencia_pago: None,
                }],
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn test_numeracion_consecutiva() {
        let db = Database::en_memoria().unwrap();
        let primera = servicio(&db, "1");
        let segunda = servicio(&db, "2");

        assert!(!verificar_factura(&db, &primera).unwrap().existe);
        let f1 = generar_factura(&db, &pruebas::empleado(), &primera).unwrap();
        let f2 = generar_factura(&db, &pruebas::empleado(), &segunda).unwrap();
        assert_eq!(f1.numero, "F-0001");
        assert_eq!(f2.numero, "F-0002");
        assert_eq!(f1.total, 30000.0);
        assert_eq!(f1.pagos, vec![("Datafono".to_string(), 30000.0)]);

        let v = verificar_factura(&db, &primera).unwrap();
        assert!(v.existe);
        assert_eq!(v.numero.as_deref(), Some("F-0001"));
    }

    #[test]
    fn test_no_duplica_factura() {
        let db = Database::en_memoria().unwrap();
        let id = servicio(&db, "1");
        generar_factura(&db, &pruebas::empleado(), &id).unwrap();
        assert!(matches!(
            generar_factura(&db, &pruebas::empleado(), &id),
            Err(AppError::Conflicto(_))
        ));
        assert_eq!(obtener_factura(&db, &id).unwrap().numero, "F-0001");
    }

    #[test]
    fn test_actividad_no_facturable() {
        let db = Database::en_memoria().unwrap();
        assert!(matches!(
            generar_factura(&db, &pruebas::empleado(), "no-existe"),
            Err(AppError::NoEncontrado(_))
        ));
        let id = servicio(&db, "1");
        actividades::anular_actividad(&db, &pruebas::admin(), &id).unwrap();
        assert!(matches!(
            generar_factura(&db, &pruebas::empleado(), &id),
            Err(AppError::NoEncontrado(_))
        ));
        assert!(matches!(obtener_factura(&db, &id), Err(AppError::NoEncontrado(_))));
    }
}
