use std::collections::BTreeMap;

use rusqlite::Connection;
use tracing::{info, warn};

use super::auditoria::registrar;
use super::{paginar, verificar_admin, Filtros};
use crate::db::Database;
use crate::error::{es_restriccion, AppError};
use crate::models::{
    ArticuloRopa, DatosArticuloRopa, DetalleVentaRopa, FiltroVentasRopa, ItemCatalogo,
    LineaVentaRopa, NuevaVentaRopa, Pagina, SesionActiva, VentaRopa,
};
use crate::utils;

pub const POR_PAGINA: i64 = 10;

// ============================================
// ARTICULOS DE ROPA
// ============================================

const SELECT_ARTICULO: &str = "SELECT id, nombre, descripcion, marca, color, talla, stock_actual,
            precio_compra, precio_venta, observacion, activo
     FROM articulos_ropa";

fn mapear_articulo(row: &rusqlite::Row) -> rusqlite::Result<ArticuloRopa> {
    Ok(ArticuloRopa {
        id: row.get(0)?,
        nombre: row.get(1)?,
        descripcion: row.get(2)?,
        marca: row.get(3)?,
        color: row.get(4)?,
        talla: row.get(5)?,
        stock_actual: row.get(6)?,
        precio_compra: row.get(7)?,
        precio_venta: row.get(8)?,
        observacion: row.get(9)?,
        activo: row.get(10)?,
    })
}

pub fn listar_articulos_ropa(
    db: &Database,
    busqueda: Option<&str>,
    pagina: i64,
) -> Result<Pagina<ArticuloRopa>, AppError> {
    let conn = db.conn.lock()?;
    let mut filtros = Filtros::default();
    if let Some(texto) = busqueda {
        filtros.agregar_texto(
            "(nombre LIKE ? OR marca LIKE ? OR color LIKE ? OR talla LIKE ?)",
            texto,
        );
    }
    let where_sql = filtros.where_sql();
    let params = filtros.refs();

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM articulos_ropa {}", where_sql),
        params.as_slice(),
        |row| row.get(0),
    )?;

    paginar(
        |limite, offset| {
            let mut stmt = conn.prepare(&format!(
                "{} {} ORDER BY nombre, talla LIMIT {} OFFSET {}",
                SELECT_ARTICULO, where_sql, limite, offset
            ))?;
            let items = stmt
                .query_map(params.as_slice(), mapear_articulo)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(items)
        },
        total,
        pagina,
        POR_PAGINA,
    )
}

/// Articulos activos con stock, para el formulario de venta
pub fn opciones_articulos_ropa(db: &Database) -> Result<Vec<ItemCatalogo>, AppError> {
    let conn = db.conn.lock()?;
    let mut stmt = conn.prepare(
        "SELECT id, nombre || COALESCE(' / ' || talla, '') || COALESCE(' / ' || color, '')
                || ' (' || stock_actual || ' disp.)'
         FROM articulos_ropa WHERE activo = 1 AND stock_actual > 0 ORDER BY nombre",
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

pub fn obtener_articulo_ropa(db: &Database, id: i64) -> Result<ArticuloRopa, AppError> {
    let conn = db.conn.lock()?;
    conn.query_row(
        &format!("{} WHERE id = ?1", SELECT_ARTICULO),
        rusqlite::params![id],
        mapear_articulo,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => {
            AppError::NoEncontrado("Articulo de ropa no encontrado".into())
        }
        e => e.into(),
    })
}

struct ArticuloValidado {
    nombre: String,
    stock_actual: i64,
    precio_compra: Option<f64>,
    precio_venta: f64,
}

fn validar_articulo(datos: &DatosArticuloRopa) -> Result<ArticuloValidado, AppError> {
    let mut errores = Vec::new();
    let nombre = datos.nombre.trim().to_uppercase();
    if nombre.is_empty() {
        errores.push("El Nombre es Obligatorio".to_string());
    }

    let stock_actual = match datos.stock_actual.trim().parse::<i64>() {
        Ok(s) if s >= 0 => s,
        _ => {
            errores.push("El Stock debe ser un entero mayor o igual a 0".to_string());
            0
        }
    };

    let precio_venta = match utils::parse_numero(&datos.precio_venta) {
        Some(p) if p > 0.0 => p,
        _ => {
            errores.push("El Precio de venta debe ser mayor a 0".to_string());
            0.0
        }
    };

    let precio_compra = match utils::limpiar(datos.precio_compra.as_deref()) {
        None => None,
        Some(texto) => match utils::parse_numero(&texto) {
            Some(p) if p >= 0.0 => Some(p),
            _ => {
                errores.push("El Precio de compra no es valido".to_string());
                None
            }
        },
    };

    if errores.is_empty() {
        Ok(ArticuloValidado {
            nombre,
            stock_actual,
            precio_compra,
            precio_venta,
        })
    } else {
        Err(AppError::Validacion(errores))
    }
}

pub fn crear_articulo_ropa(db: &Database, datos: &DatosArticuloRopa) -> Result<i64, AppError> {
    let v = validar_articulo(datos)?;
    let conn = db.conn.lock()?;
    conn.execute(
        "INSERT INTO articulos_ropa (nombre, descripcion, marca, color, talla, stock_actual,
            precio_compra, precio_venta, observacion, activo, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1, ?10, ?10)",
        rusqlite::params![
            v.nombre,
            utils::limpiar(datos.descripcion.as_deref()),
            utils::limpiar(datos.marca.as_deref()),
            utils::limpiar(datos.color.as_deref()),
            utils::limpiar(datos.talla.as_deref()),
            v.stock_actual,
            v.precio_compra,
            v.precio_venta,
            utils::limpiar(datos.observacion.as_deref()),
            db.ahora(),
        ],
    )?;
    let id = conn.last_insert_rowid();
    info!(articulo_ropa_id = id, "clothing item created");
    Ok(id)
}

pub fn actualizar_articulo_ropa(
    db: &Database,
    id: i64,
    datos: &DatosArticuloRopa,
) -> Result<(), AppError> {
    let v = validar_articulo(datos)?;
    let conn = db.conn.lock()?;
    let filas = conn.execute(
        "UPDATE articulos_ropa
         SET nombre = ?1, descripcion = ?2, marca = ?3, color = ?4, talla = ?5, stock_actual = ?6,
             precio_compra = ?7, precio_venta = ?8, observacion = ?9, activo = ?10, updated_at = ?11
         WHERE id = ?12",
        rusqlite::params![
            v.nombre,
            utils::limpiar(datos.descripcion.as_deref()),
            utils::limpiar(datos.marca.as_deref()),
            utils::limpiar(datos.color.as_deref()),
            utils::limpiar(datos.talla.as_deref()),
            v.stock_actual,
            v.precio_compra,
            v.precio_venta,
            utils::limpiar(datos.observacion.as_deref()),
            datos.activo,
            db.ahora(),
            id,
        ],
    )?;
    if filas == 0 {
        return Err(AppError::NoEncontrado("Articulo de ropa no encontrado".into()));
    }
    Ok(())
}

pub fn eliminar_articulo_ropa(db: &Database, sesion: &SesionActiva, id: i64) -> Result<(), AppError> {
    verificar_admin(sesion)?;
    let conn = db.conn.lock()?;
    match conn.execute("DELETE FROM articulos_ropa WHERE id = ?1", rusqlite::params![id]) {
        Ok(0) => Err(AppError::NoEncontrado("Articulo de ropa no encontrado".into())),
        Ok(_) => Ok(()),
        Err(e) if es_restriccion(&e) => Err(AppError::Conflicto(
            "El articulo tiene ventas registradas; desactivelo en su lugar".into(),
        )),
        Err(e) => Err(e.into()),
    }
}

// ============================================
// VENTAS
// ============================================

fn agrupar(lineas: &[LineaVentaRopa]) -> BTreeMap<i64, i64> {
    let mut mapa = BTreeMap::new();
    for linea in lineas {
        *mapa.entry(linea.articulo_ropa_id).or_insert(0) += linea.cantidad;
    }
    mapa
}

fn validar_venta(conn: &Connection, datos: &NuevaVentaRopa) -> Result<(), AppError> {
    let mut errores = Vec::new();
    if let Some(cliente_id) = datos.cliente_id {
        let tipo: Option<String> = conn
            .query_row(
                "SELECT tipo FROM clientes WHERE id = ?1",
                rusqlite::params![cliente_id],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                e => Err(e),
            })?;
        match tipo.as_deref() {
            None => errores.push("El Cliente no existe".to_string()),
            Some("Ropa") | Some("Ambos") => {}
            Some(_) => errores.push("El Cliente no esta habilitado para compras de ropa".to_string()),
        }
    }
    if datos.lineas.is_empty() {
        errores.push("Debe agregar al menos un articulo".to_string());
    }
    if datos.lineas.iter().any(|l| l.cantidad <= 0) {
        errores.push("Las cantidades deben ser enteros mayores a 0".to_string());
    }
    if errores.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validacion(errores))
    }
}

/// Descuenta el stock e inserta las lineas al precio de venta actual. Devuelve el total.
fn aplicar_lineas(
    conn: &Connection,
    venta_id: i64,
    lineas: &[LineaVentaRopa],
    ahora: &str,
) -> Result<f64, AppError> {
    let mut errores = Vec::new();
    let mut precios = BTreeMap::new();
    for (articulo_id, cantidad) in agrupar(lineas) {
        let fila = conn.query_row(
            "SELECT nombre, stock_actual, precio_venta FROM articulos_ropa WHERE id = ?1",
            rusqlite::params![articulo_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, f64>(2)?,
                ))
            },
        );
        match fila {
            Ok((nombre, stock, precio)) => {
                if cantidad > stock {
                    errores.push(format!("Cantidad para \"{}\" supera el stock", nombre));
                }
                precios.insert(articulo_id, precio);
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                errores.push(format!("El articulo de ropa {} no existe", articulo_id));
            }
            Err(e) => return Err(e.into()),
        }
    }
    if !errores.is_empty() {
        warn!(faltantes = errores.len(), "clothing sale rejected");
        return Err(AppError::Validacion(errores));
    }

    let mut total = 0.0;
    for linea in lineas {
        let precio = precios.get(&linea.articulo_ropa_id).copied().unwrap_or(0.0);
        let subtotal = precio * linea.cantidad as f64;
        total += subtotal;
        conn.execute(
            "INSERT INTO detalle_venta_ropa (venta_id, articulo_ropa_id, cantidad, precio_unitario, subtotal)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![venta_id, linea.articulo_ropa_id, linea.cantidad, precio, subtotal],
        )?;
    }
    for (articulo_id, cantidad) in agrupar(lineas) {
        conn.execute(
            "UPDATE articulos_ropa SET stock_actual = stock_actual - ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![cantidad, ahora, articulo_id],
        )?;
    }
    Ok(total)
}

/// Devuelve al stock lo vendido y borra las lineas de la venta
fn revertir_lineas(conn: &Connection, venta_id: i64, ahora: &str) -> Result<(), AppError> {
    conn.execute(
        "UPDATE articulos_ropa
         SET stock_actual = stock_actual + (SELECT SUM(d.cantidad) FROM detalle_venta_ropa d
                                            WHERE d.venta_id = ?1 AND d.articulo_ropa_id = articulos_ropa.id),
             updated_at = ?2
         WHERE id IN (SELECT articulo_ropa_id FROM detalle_venta_ropa WHERE venta_id = ?1)",
        rusqlite::params![venta_id, ahora],
    )?;
    conn.execute(
        "DELETE FROM detalle_venta_ropa WHERE venta_id = ?1",
        rusqlite::params![venta_id],
    )?;
    Ok(())
}

fn existe_venta(conn: &Connection, id: i64) -> Result<(), AppError> {
    let existe: i64 = conn.query_row(
        "SELECT COUNT(*) FROM ventas_ropa WHERE id = ?1",
        rusqlite::params![id],
        |row| row.get(0),
    )?;
    if existe == 0 {
        return Err(AppError::NoEncontrado("Venta no encontrada".into()));
    }
    Ok(())
}

pub fn crear_venta(
    db: &Database,
    sesion: &SesionActiva,
    datos: &NuevaVentaRopa,
) -> Result<i64, AppError> {
    let mut conn = db.conn.lock()?;
    validar_venta(&conn, datos)?;
    let ahora = db.ahora();

    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO ventas_ropa (cliente_id, total, usuario_id, created_at, updated_at)
         VALUES (?1, 0, ?2, ?3, ?3)",
        rusqlite::params![datos.cliente_id, sesion.usuario_id, ahora],
    )?;
    let id = tx.last_insert_rowid();
    let total = aplicar_lineas(&tx, id, &datos.lineas, &ahora)?;
    tx.execute(
        "UPDATE ventas_ropa SET total = ?1 WHERE id = ?2",
        rusqlite::params![total, id],
    )?;
    tx.commit()?;

    info!(venta_id = id, total, "clothing sale registered");
    Ok(id)
}

const SELECT_VENTA: &str = "SELECT v.id, v.cliente_id, c.nombre || ' ' || c.apellidos, v.total,
            u.nombre, v.created_at
     FROM ventas_ropa v
     JOIN usuarios u ON u.id = v.usuario_id
     LEFT JOIN clientes c ON c.id = v.cliente_id";

fn mapear_venta(row: &rusqlite::Row) -> rusqlite::Result<VentaRopa> {
    Ok(VentaRopa {
        id: row.get(0)?,
        cliente_id: row.get(1)?,
        cliente: row.get(2)?,
        total: row.get(3)?,
        usuario: row.get(4)?,
        created_at: row.get(5)?,
        detalles: Vec::new(),
    })
}

fn cargar_detalles(conn: &Connection, venta: &mut VentaRopa) -> Result<(), AppError> {
    let mut stmt = conn.prepare_cached(
        "SELECT d.articulo_ropa_id, a.nombre || COALESCE(' / ' || a.talla, ''), d.cantidad,
                d.precio_unitario, d.subtotal
         FROM detalle_venta_ropa d JOIN articulos_ropa a ON a.id = d.articulo_ropa_id
         WHERE d.venta_id = ?1 ORDER BY d.id",
    )?;
    venta.detalles = stmt
        .query_map(rusqlite::params![venta.id], |row| {
            Ok(DetalleVentaRopa {
                articulo_ropa_id: row.get(0)?,
                articulo: row.get(1)?,
                cantidad: row.get(2)?,
                precio_unitario: row.get(3)?,
                subtotal: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(())
}

pub fn listar_ventas(
    db: &Database,
    filtro: &FiltroVentasRopa,
    pagina: i64,
) -> Result<Pagina<VentaRopa>, AppError> {
    let conn = db.conn.lock()?;
    let mut filtros = Filtros::default();
    if let Some(texto) = &filtro.busqueda {
        filtros.agregar_texto("(c.nombre LIKE ? OR c.apellidos LIKE ?)", texto);
    }
    if let Some(inicio) = &filtro.fecha_inicio {
        filtros.agregar("date(v.created_at) >= date(?)", inicio.clone());
    }
    if let Some(fin) = &filtro.fecha_fin {
        filtros.agregar("date(v.created_at) <= date(?)", fin.clone());
    }
    let where_sql = filtros.where_sql();
    let params = filtros.refs();

    let total: i64 = conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM ventas_ropa v LEFT JOIN clientes c ON c.id = v.cliente_id {}",
            where_sql
        ),
        params.as_slice(),
        |row| row.get(0),
    )?;

    paginar(
        |limite, offset| {
            let mut stmt = conn.prepare(&format!(
                "{} {} ORDER BY v.created_at DESC, v.id DESC LIMIT {} OFFSET {}",
                SELECT_VENTA, where_sql, limite, offset
            ))?;
            let mut items = stmt
                .query_map(params.as_slice(), mapear_venta)?
                .collect::<Result<Vec<_>, _>>()?;
            for venta in items.iter_mut() {
                cargar_detalles(&conn, venta)?;
            }
            Ok(items)
        },
        total,
        pagina,
        POR_PAGINA,
    )
}

pub fn obtener_venta(db: &Database, id: i64) -> Result<VentaRopa, AppError> {
    let conn = db.conn.lock()?;
    let mut venta = conn
        .query_row(
            &format!("{} WHERE v.id = ?1", SELECT_VENTA),
            rusqlite::params![id],
            mapear_venta,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                AppError::NoEncontrado("Venta no encontrada".into())
            }
            e => e.into(),
        })?;
    cargar_detalles(&conn, &mut venta)?;
    Ok(venta)
}

/// Devuelve el stock anterior y registra las nuevas lineas
pub fn editar_venta(
    db: &Database,
    sesion: &SesionActiva,
    id: i64,
    datos: &NuevaVentaRopa,
) -> Result<(), AppError> {
    let mut conn = db.conn.lock()?;
    validar_venta(&conn, datos)?;
    let ahora = db.ahora();

    let tx = conn.transaction()?;
    existe_venta(&tx, id)?;
    revertir_lineas(&tx, id, &ahora)?;
    let total = aplicar_lineas(&tx, id, &datos.lineas, &ahora)?;
    tx.execute(
        "UPDATE ventas_ropa SET cliente_id = ?1, total = ?2, updated_at = ?3 WHERE id = ?4",
        rusqlite::params![datos.cliente_id, total, ahora, id],
    )?;
    registrar(
        &tx,
        "MODIFICAR",
        "ventas_ropa",
        &id.to_string(),
        &format!("Venta de ropa modificada, nuevo total {}", utils::formatear_moneda(total)),
        sesion.usuario_id,
        &ahora,
    )?;
    tx.commit()?;
    info!(venta_id = id, total, "clothing sale edited");
    Ok(())
}

pub fn eliminar_venta(db: &Database, sesion: &SesionActiva, id: i64) -> Result<(), AppError> {
    let mut conn = db.conn.lock()?;
    let ahora = db.ahora();
    let tx = conn.transaction()?;

    existe_venta(&tx, id)?;
    let total: f64 = tx.query_row(
        "SELECT total FROM ventas_ropa WHERE id = ?1",
        rusqlite::params![id],
        |row| row.get(0),
    )?;
    revertir_lineas(&tx, id, &ahora)?;
    tx.execute("DELETE FROM ventas_ropa WHERE id = ?1", rusqlite::params![id])?;
    registrar(
        &tx,
        "ELIMINAR",
        "ventas_ropa",
        &id.to_string(),
        &format!("Venta de ropa por {} eliminada", utils::formatear_moneda(total)),
        sesion.usuario_id,
        &ahora,
    )?;
    tx.commit()?;
    info!(venta_id = id, "clothing sale deleted");
    Ok(())
}
