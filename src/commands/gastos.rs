use rusqlite::Connection;
use tracing::{info, warn};

use super::auditoria::registrar;
use super::{paginar, verificar_admin, Filtros};
use crate::db::Database;
use crate::error::AppError;
use crate::models::{
    DetalleCompra, FiltroGastos, GastoAdicional, LineaCompra, NuevoGastoAdicional, Pagina,
    SesionActiva, GASTO_ANULADO, GASTO_CONSOLIDADO,
};
use crate::utils;

pub const POR_PAGINA: i64 = 10;

struct Validado {
    numero_factura: String,
    proveedor_id: i64,
    fecha_gasto: String,
    descripcion: Option<String>,
    valor_total: f64,
}

fn validar(
    conn: &Connection,
    datos: &NuevoGastoAdicional,
    excepto: Option<i64>,
) -> Result<Validado, AppError> {
    let mut errores = Vec::new();
    let numero_factura = datos.numero_factura.trim().to_uppercase();

    if numero_factura.is_empty() {
        errores.push("El Numero de factura es Obligatorio".to_string());
    } else {
        let en_uso: i64 = conn.query_row(
            "SELECT COUNT(*) FROM gastos_adicionales WHERE numero_factura = ?1 AND id != COALESCE(?2, -1)",
            rusqlite::params![numero_factura, excepto],
            |row| row.get(0),
        )?;
        if en_uso > 0 {
            errores.push("El Numero de factura ya esta registrado".to_string());
        }
    }

    if datos.proveedor_id.is_none() {
        errores.push("El Proveedor es Obligatorio".to_string());
    }

    let fecha_gasto = utils::parse_fecha(&datos.fecha_gasto);
    if fecha_gasto.is_none() {
        errores.push("La Fecha del gasto no es valida".to_string());
    }

    if datos.lineas.is_empty() {
        errores.push("Debe agregar al menos un articulo".to_string());
    }
    for linea in &datos.lineas {
        if !linea.cantidad.is_finite() || linea.cantidad < 0.01 {
            errores.push("La Cantidad minima es 0.01".to_string());
        }
        if !linea.precio_unitario.is_finite() || linea.precio_unitario < 0.0 {
            errores.push("El Precio unitario no puede ser negativo".to_string());
        }
        let existe: i64 = conn.query_row(
            "SELECT COUNT(*) FROM articulos WHERE id = ?1",
            rusqlite::params![linea.articulo_id],
            |row| row.get(0),
        )?;
        if existe == 0 {
            errores.push(format!("El articulo {} no existe", linea.articulo_id));
        }
    }

    match (datos.proveedor_id, fecha_gasto) {
        (Some(proveedor_id), Some(fecha)) if errores.is_empty() => Ok(Validado {
            numero_factura,
            proveedor_id,
            fecha_gasto: fecha.format("%Y-%m-%d").to_string(),
            descripcion: utils::limpiar(datos.descripcion.as_deref()),
            valor_total: datos
                .lineas
                .iter()
                .map(|l| l.cantidad * l.precio_unitario)
                .sum(),
        }),
        _ => Err(AppError::Validacion(errores)),
    }
}

/// Suma las cantidades al stock de los articulos cuya categoria afecta stock
/// y actualiza su costo unitario con el de la compra.
fn ingresar_stock(conn: &Connection, lineas: &[LineaCompra], ahora: &str) -> Result<(), AppError> {
    for linea in lineas {
        conn.execute(
            "UPDATE articulos
             SET stock_actual = ROUND(stock_actual + ?1, 3), costo_unitario = ?2, updated_at = ?3
             WHERE id = ?4
               AND categoria_id IN (SELECT id FROM categorias WHERE afecta_stock = 1)",
            rusqlite::params![linea.cantidad, linea.precio_unitario, ahora, linea.articulo_id],
        )?;
    }
    Ok(())
}

/// Resta lo que ingreso una compra. Falla si algun stock quedaria negativo.
fn revertir_stock(conn: &Connection, gasto_id: i64, ahora: &str) -> Result<(), AppError> {
    let mut stmt = conn.prepare(
        "SELECT a.id, a.nombre, a.stock_actual, SUM(d.cantidad)
         FROM detalle_gasto_adicional d
         JOIN articulos a ON a.id = d.articulo_id
         JOIN categorias c ON c.id = a.categoria_id
         WHERE d.gasto_id = ?1 AND c.afecta_stock = 1
         GROUP BY a.id",
    )?;
    let filas = stmt
        .query_map(rusqlite::params![gasto_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, f64>(3)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let errores: Vec<String> = filas
        .iter()
        .filter(|(_, _, stock, cantidad)| cantidad - stock > 1e-9)
        .map(|(_, nombre, _, _)| {
            format!("No se puede revertir: el stock de \"{}\" quedaria negativo", nombre)
        })
        .collect();
    if !errores.is_empty() {
        warn!(gasto_id, "purchase revert would leave negative stock");
        return Err(AppError::Validacion(errores));
    }

    for (articulo_id, _, _, cantidad) in filas {
        conn.execute(
            "UPDATE articulos SET stock_actual = MAX(ROUND(stock_actual - ?1, 3), 0), updated_at = ?2
             WHERE id = ?3",
            rusqlite::params![cantidad, ahora, articulo_id],
        )?;
    }
    Ok(())
}

fn insertar_lineas(conn: &Connection, gasto_id: i64, lineas: &[LineaCompra]) -> Result<(), AppError> {
    for linea in lineas {
        conn.execute(
            "INSERT INTO detalle_gasto_adicional (gasto_id, articulo_id, cantidad, precio_unitario, subtotal)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                gasto_id,
                linea.articulo_id,
                linea.cantidad,
                linea.precio_unitario,
                linea.cantidad * linea.precio_unitario
            ],
        )?;
    }
    Ok(())
}

pub fn crear_gasto(
    db: &Database,
    sesion: &SesionActiva,
    datos: &NuevoGastoAdicional,
) -> Result<i64, AppError> {
    let mut conn = db.conn.lock()?;
    let v = validar(&conn, datos, None)?;
    let ahora = db.ahora();

    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO gastos_adicionales (numero_factura, proveedor_id, fecha_gasto, descripcion, valor_total, estado, usuario_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
        rusqlite::params![
            v.numero_factura,
            v.proveedor_id,
            v.fecha_gasto,
            v.descripcion,
            v.valor_total,
            GASTO_CONSOLIDADO,
            sesion.usuario_id,
            ahora
        ],
    )?;
    let id = tx.last_insert_rowid();
    insertar_lineas(&tx, id, &datos.lineas)?;
    ingresar_stock(&tx, &datos.lineas, &ahora)?;
    tx.commit()?;

    info!(gasto_id = id, valor_total = v.valor_total, "purchase registered");
    Ok(id)
}

fn filtros_gastos(filtro: &FiltroGastos) -> Filtros {
    let mut filtros = Filtros::default();
    if let Some(texto) = &filtro.busqueda {
        filtros.agregar_texto(
            "(g.numero_factura LIKE ? OR g.descripcion LIKE ? OR p.razon_social LIKE ?
              OR EXISTS (SELECT 1 FROM detalle_gasto_adicional d JOIN articulos a ON a.id = d.articulo_id
                         WHERE d.gasto_id = g.id AND a.nombre LIKE ?))",
            texto,
        );
    }
    if let Some(id) = filtro.proveedor_id {
        filtros.agregar("g.proveedor_id = ?", id);
    }
    if let Some(inicio) = &filtro.fecha_inicio {
        filtros.agregar("g.fecha_gasto >= date(?)", inicio.clone());
    }
    if let Some(fin) = &filtro.fecha_fin {
        filtros.agregar("g.fecha_gasto <= date(?)", fin.clone());
    }
    filtros
}

const SELECT_GASTO: &str = "SELECT g.id, g.numero_factura, g.proveedor_id, p.razon_social,
            g.fecha_gasto, g.descripcion, g.valor_total, g.estado, u.nombre
     FROM gastos_adicionales g
     JOIN proveedores p ON p.id = g.proveedor_id
     JOIN usuarios u ON u.id = g.usuario_id";

fn mapear(row: &rusqlite::Row) -> rusqlite::Result<GastoAdicional> {
    Ok(GastoAdicional {
        id: row.get(0)?,
        numero_factura: row.get(1)?,
        proveedor_id: row.get(2)?,
        proveedor: row.get(3)?,
        fecha_gasto: row.get(4)?,
        descripcion: row.get(5)?,
        valor_total: row.get(6)?,
        estado: row.get(7)?,
        usuario: row.get(8)?,
        detalles: Vec::new(),
    })
}

pub fn listar_gastos(
    db: &Database,
    filtro: &FiltroGastos,
    pagina: i64,
) -> Result<Pagina<GastoAdicional>, AppError> {
    let conn = db.conn.lock()?;
    let filtros = filtros_gastos(filtro);
    let where_sql = filtros.where_sql();
    let params = filtros.refs();

    let total: i64 = conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM gastos_adicionales g JOIN proveedores p ON p.id = g.proveedor_id {}",
            where_sql
        ),
        params.as_slice(),
        |row| row.get(0),
    )?;

    paginar(
        |limite, offset| {
            let mut stmt = conn.prepare(&format!(
                "{} {} ORDER BY g.fecha_gasto DESC, g.id DESC LIMIT {} OFFSET {}",
                SELECT_GASTO, where_sql, limite, offset
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

pub fn obtener_gasto(db: &Database, id: i64) -> Result<GastoAdicional, AppError> {
    let conn = db.conn.lock()?;
    let mut gasto = conn
        .query_row(
            &format!("{} WHERE g.id = ?1", SELECT_GASTO),
            rusqlite::params![id],
            mapear,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                AppError::NoEncontrado("Gasto no encontrado".into())
            }
            e => e.into(),
        })?;

    let mut stmt = conn.prepare(
        "SELECT d.articulo_id, a.nombre, d.cantidad, d.precio_unitario, d.subtotal
         FROM detalle_gasto_adicional d JOIN articulos a ON a.id = d.articulo_id
         WHERE d.gasto_id = ?1 ORDER BY d.id",
    )?;
    gasto.detalles = stmt
        .query_map(rusqlite::params![id], |row| {
            Ok(DetalleCompra {
                articulo_id: row.get(0)?,
                articulo: row.get(1)?,
                cantidad: row.get(2)?,
                precio_unitario: row.get(3)?,
                subtotal: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(gasto)
}

fn estado_gasto(conn: &Connection, id: i64) -> Result<String, AppError> {
    conn.query_row(
        "SELECT estado FROM gastos_adicionales WHERE id = ?1",
        rusqlite::params![id],
        |row| row.get(0),
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => AppError::NoEncontrado("Gasto no encontrado".into()),
        e => e.into(),
    })
}

/// Solo Admin y solo gastos consolidados. Reemplaza cabecera y lineas.
pub fn editar_gasto(
    db: &Database,
    sesion: &SesionActiva,
    id: i64,
    datos: &NuevoGastoAdicional,
) -> Result<(), AppError> {
    verificar_admin(sesion)?;
    let mut conn = db.conn.lock()?;
    if estado_gasto(&conn, id)? != GASTO_CONSOLIDADO {
        return Err(AppError::Conflicto("Solo se editan gastos consolidados".into()));
    }
    let v = validar(&conn, datos, Some(id))?;
    let ahora = db.ahora();

    let tx = conn.transaction()?;
    revertir_stock(&tx, id, &ahora)?;
    tx.execute(
        "DELETE FROM detalle_gasto_adicional WHERE gasto_id = ?1",
        rusqlite::params![id],
    )?;
    tx.execute(
        "UPDATE gastos_adicionales
         SET numero_factura = ?1, proveedor_id = ?2, fecha_gasto = ?3, descripcion = ?4,
             valor_total = ?5, updated_at = ?6
         WHERE id = ?7",
        rusqlite::params![
            v.numero_factura,
            v.proveedor_id,
            v.fecha_gasto,
            v.descripcion,
            v.valor_total,
            ahora,
            id
        ],
    )?;
    insertar_lineas(&tx, id, &datos.lineas)?;
    ingresar_stock(&tx, &datos.lineas, &ahora)?;
    registrar(
        &tx,
        "MODIFICAR",
        "gastos_adicionales",
        &id.to_string(),
        &format!(
            "Gasto {} modificado, nuevo total {}",
            v.numero_factura,
            utils::formatear_moneda(v.valor_total)
        ),
        sesion.usuario_id,
        &ahora,
    )?;
    tx.commit()?;
    info!(gasto_id = id, "purchase edited");
    Ok(())
}

pub fn anular_gasto(db: &Database, sesion: &SesionActiva, id: i64) -> Result<(), AppError> {
    verificar_admin(sesion)?;
    let mut conn = db.conn.lock()?;
    let ahora = db.ahora();
    let tx = conn.transaction()?;

    if estado_gasto(&tx, id)? == GASTO_ANULADO {
        return Err(AppError::Conflicto("El gasto ya esta anulado".into()));
    }
    revertir_stock(&tx, id, &ahora)?;
    tx.execute(
        "UPDATE gastos_adicionales SET estado = ?1, updated_at = ?2 WHERE id = ?3",
        rusqlite::params![GASTO_ANULADO, ahora, id],
    )?;
    let numero: String = tx.query_row(
        "SELECT numero_factura FROM gastos_adicionales WHERE id = ?1",
        rusqlite::params![id],
        |row| row.get(0),
    )?;
    registrar(
        &tx,
        "ANULAR",
        "gastos_adicionales",
        &id.to_string(),
        &format!("Gasto {} anulado", numero),
        sesion.usuario_id,
        &ahora,
    )?;
    tx.commit()?;
    info!(gasto_id = id, "purchase voided");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::pruebas;

    fn compra(proveedor_id: i64, articulo_id: i64, cantidad: f64) -> NuevoGastoAdicional {
        NuevoGastoAdicional {
            numero_factura: "fv-100".into(),
            proveedor_id: Some(proveedor_id),
            fecha_gasto: "2026-03-10".into(),
            descripcion: Some("Reposicion".into()),
            lineas: vec![LineaCompra {
                articulo_id,
                cantidad,
                precio_unitario: 2500.0,
            }],
        }
    }

    #[test]
    fn test_crear_suma_stock_y_actualiza_costo() {
        let db = Database::en_memoria().unwrap();
        let proveedor = pruebas::proveedor(&db, "DISTRIBUIDORA BELLEZA", "900123");
        let articulo = pruebas::articulo(&db, "ACETONA", 1.0);

        let id = crear_gasto(&db, &pruebas::admin(), &compra(proveedor, articulo, 4.0)).unwrap();
        let gasto = obtener_gasto(&db, id).unwrap();
        assert_eq!(gasto.numero_factura, "FV-100");
        assert_eq!(gasto.valor_total, 10000.0);
        assert_eq!(gasto.detalles.len(), 1);
        assert!((pruebas::stock(&db, articulo) - 5.0).abs() < 1e-9);
        assert_eq!(
            pruebas::contar(&db, "SELECT CAST(costo_unitario AS INTEGER) FROM articulos"),
            2500
        );
    }

    #[test]
    fn test_categoria_sin_stock_no_cambia_existencias() {
        let db = Database::en_memoria().unwrap();
        let proveedor = pruebas::proveedor(&db, "EPM", "890904");
        let articulo = pruebas::articulo(&db, "ENERGIA", 0.0);
        {
            let conn = db.conn.lock().unwrap();
            conn.execute(
                "UPDATE articulos SET categoria_id = (SELECT id FROM categorias WHERE nombre = 'SERVICIOS PÚBLICOS')",
                [],
            )
            .unwrap();
        }
        crear_gasto(&db, &pruebas::admin(), &compra(proveedor, articulo, 1.0)).unwrap();
        assert_eq!(pruebas::stock(&db, articulo), 0.0);
    }

    #[test]
    fn test_factura_unica_y_lineas_obligatorias() {
        let db = Database::en_memoria().unwrap();
        let proveedor = pruebas::proveedor(&db, "DISTRIBUIDORA", "900123");
        let articulo = pruebas::articulo(&db, "ACETONA", 1.0);
        crear_gasto(&db, &pruebas::admin(), &compra(proveedor, articulo, 1.0)).unwrap();

        let mut repetida = compra(proveedor, articulo, 1.0);
        repetida.lineas.clear();
        match crear_gasto(&db, &pruebas::admin(), &repetida).unwrap_err() {
            AppError::Validacion(errores) => assert_eq!(errores.len(), 2),
            otro => panic!("error inesperado: {otro:?}"),
        }
    }

    #[test]
    fn test_anular_revierte_stock() {
        let db = Database::en_memoria().unwrap();
        let proveedor = pruebas::proveedor(&db, "DISTRIBUIDORA", "900123");
        let articulo = pruebas::articulo(&db, "ACETONA", 1.0);
        let id = crear_gasto(&db, &pruebas::admin(), &compra(proveedor, articulo, 4.0)).unwrap();

        anular_gasto(&db, &pruebas::admin(), id).unwrap();
        assert!((pruebas::stock(&db, articulo) - 1.0).abs() < 1e-9);
        assert_eq!(obtener_gasto(&db, id).unwrap().estado, GASTO_ANULADO);
        assert!(matches!(
            anular_gasto(&db, &pruebas::admin(), id),
            Err(AppError::Conflicto(_))
        ));
    }

    #[test]
    fn test_no_revierte_si_el_stock_ya_se_consumio() {
        let db = Database::en_memoria().unwrap();
        let proveedor = pruebas::proveedor(&db, "DISTRIBUIDORA", "900123");
        let articulo = pruebas::articulo(&db, "ACETONA", 0.0);
        let id = crear_gasto(&db, &pruebas::admin(), &compra(proveedor, articulo, 4.0)).unwrap();
        {
            let conn = db.conn.lock().unwrap();
            conn.execute("UPDATE articulos SET stock_actual = 1", []).unwrap();
        }
        assert!(matches!(
            anular_gasto(&db, &pruebas::admin(), id),
            Err(AppError::Validacion(_))
        ));
        assert_eq!(obtener_gasto(&db, id).unwrap().estado, GASTO_CONSOLIDADO);
    }

    #[test]
    fn test_editar_reemplaza_lineas() {
        let db = Database::en_memoria().unwrap();
        let proveedor = pruebas::proveedor(&db, "DISTRIBUIDORA", "900123");
        let articulo = pruebas::articulo(&db, "ACETONA", 1.0);
        let id = crear_gasto(&db, &pruebas::admin(), &compra(proveedor, articulo, 4.0)).unwrap();

        assert!(matches!(
            editar_gasto(&db, &pruebas::empleado(), id, &compra(proveedor, articulo, 2.0)),
            Err(AppError::NoAutorizado)
        ));
        editar_gasto(&db, &pruebas::admin(), id, &compra(proveedor, articulo, 2.0)).unwrap();
        assert!((pruebas::stock(&db, articulo) - 3.0).abs() < 1e-9);
        assert_eq!(obtener_gasto(&db, id).unwrap().valor_total, 5000.0);
    }

    #[test]
    fn test_busqueda_por_articulo() {
        let db = Database::en_memoria().unwrap();
        let proveedor = pruebas::proveedor(&db, "DISTRIBUIDORA", "900123");
        let articulo = pruebas::articulo(&db, "ACETONA", 1.0);
        crear_gasto(&db, &pruebas::admin(), &compra(proveedor, articulo, 1.0)).unwrap();

        let filtro = FiltroGastos {
            busqueda: Some("aceto".into()),
            ..Default::default()
        };
        assert_eq!(listar_gastos(&db, &filtro, 1).unwrap().total, 1);
        let filtro = FiltroGastos {
            fecha_inicio: Some("2026-04-01".into()),
            ..Default::default()
        };
        assert_eq!(listar_gastos(&db, &filtro, 1).unwrap().total, 0);
    }

    #[test]
    fn test_cantidades_no_finitas_son_invalidas() {
        let db = Database::en_memoria().unwrap();
        let proveedor = pruebas::proveedor(&db, "DISTRIBUIDORA", "900123");
        let articulo = pruebas::articulo(&db, "ACETONA", 1.0);

        for cantidad in [f64::INFINITY, f64::NAN] {
            assert!(matches!(
                crear_gasto(&db, &pruebas::admin(), &compra(proveedor, articulo, cantidad)),
                Err(AppError::Validacion(_))
            ));
        }
        let mut precio_infinito = compra(proveedor, articulo, 1.0);
        precio_infinito.lineas[0].precio_unitario = f64::INFINITY;
        assert!(matches!(
            crear_gasto(&db, &pruebas::admin(), &precio_infinito),
            Err(AppError::Validacion(_))
        ));

        assert_eq!(pruebas::stock(&db, articulo), 1.0);
        assert_eq!(pruebas::contar(&db, "SELECT COUNT(*) FROM gastos_adicionales"), 0);
    }
}
