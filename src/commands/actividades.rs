use rusqlite::Connection;
use tracing::{info, warn};

use super::auditoria::registrar;
use super::inventario::{descontar_stock, devolver_stock};
use super::{verificar_admin, Filtros};
use crate::db::Database;
use crate::error::AppError;
use crate::models::{
    Actividad, Ficha, FiltroActividades, ItemCatalogo, LineaInsumo, NuevaActividad, Pagina,
    PagoActividad, PagoPersonal, ServicioPagado, SesionActiva, TotalesPagos, ESTADO_ANULADA,
    ESTADO_REALIZADA,
};
use crate::utils;

pub const FICHAS_POR_PAGINA: i64 = 4;
pub const PAGOS_POR_PAGINA: i64 = 12;

pub fn opciones_formas_pago(db: &Database) -> Result<Vec<ItemCatalogo>, AppError> {
    let conn = db.conn.lock()?;
    let mut stmt = conn.prepare("SELECT id, nombre FROM formas_pago ORDER BY id")?;
    let formas = stmt
        .query_map([], |row| {
            Ok(ItemCatalogo {
                id: row.get(0)?,
                nombre: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(formas)
}

// ============================================
// CREAR
// ============================================

/// Monto del precio a cobrar: el elegido o el del procedimiento
fn resolver_precio(
    conn: &Connection,
    datos: &NuevaActividad,
    errores: &mut Vec<String>,
) -> Result<Option<(i64, f64)>, AppError> {
    let precio_id = match datos.precio_id {
        Some(id) => Some(id),
        None => match datos.procedimiento_id {
            Some(procedimiento_id) => conn
                .query_row(
                    "SELECT precio_id FROM procedimientos WHERE id = ?1",
                    rusqlite::params![procedimiento_id],
                    |row| row.get::<_, Option<i64>>(0),
                )
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => {
                        errores.push("El Procedimiento no existe".to_string());
                        Ok(None)
                    }
                    e => Err(e),
                })?,
            None => None,
        },
    };

    let Some(precio_id) = precio_id else {
        if datos.procedimiento_id.is_some() {
            errores.push("El Precio es Obligatorio".to_string());
        }
        return Ok(None);
    };

    match conn.query_row(
        "SELECT monto FROM precios WHERE id = ?1",
        rusqlite::params![precio_id],
        |row| row.get::<_, f64>(0),
    ) {
        Ok(monto) => Ok(Some((precio_id, monto))),
        Err(rusqlite::Error::QueryReturnedNoRows) => {
            errores.push("El Precio no existe".to_string());
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Nombre de la forma de pago, o None si no existe
fn forma_pago(conn: &Connection, id: i64) -> Result<Option<String>, AppError> {
    match conn.query_row(
        "SELECT nombre FROM formas_pago WHERE id = ?1",
        rusqlite::params![id],
        |row| row.get::<_, String>(0),
    ) {
        Ok(nombre) => Ok(Some(nombre)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Registra un servicio o un vale. Devuelve el id (UUID) de la actividad.
pub fn crear_actividad(
    db: &Database,
    sesion: &SesionActiva,
    datos: &NuevaActividad,
) -> Result<String, AppError> {
    let mut conn = db.conn.lock()?;
    let mut errores = Vec::new();

    if datos.personal_id.is_none() {
        errores.push("El Personal es Obligatorio".to_string());
    }
    if !datos.vales.is_finite() || datos.vales < 0.0 {
        errores.push("Los Vales no pueden ser negativos".to_string());
    }

    let precio = if datos.es_vale() {
        if utils::limpiar(datos.descripcion.as_deref()).is_none() {
            errores.push("La Descripcion del vale es Obligatoria".to_string());
        }
        if datos.procedimiento_id.is_some() || !datos.pagos.is_empty() {
            errores.push("Un vale no puede incluir servicio ni pagos".to_string());
        }
        None
    } else {
        if datos.cliente_id.is_none() {
            errores.push("El Cliente es Obligatorio".to_string());
        }
        if datos.procedimiento_id.is_none() {
            errores.push("El Procedimiento es Obligatorio".to_string());
        }
        if datos.pagos.is_empty() {
            errores.push("Debe registrar al menos un pago".to_string());
        }
        resolver_precio(&conn, datos, &mut errores)?
    };

    let mut pagos = Vec::with_capacity(datos.pagos.len());
    for pago in &datos.pagos {
        if !pago.monto.is_finite() || pago.monto <= 0.0 {
            errores.push("Cada pago debe ser mayor a 0".to_string());
            continue;
        }
        match forma_pago(&conn, pago.forma_pago_id)? {
            Some(nombre) if nombre == "Efectivo" => pagos.push((pago.forma_pago_id, None, pago.monto, None)),
            Some(_) => pagos.push((
                pago.forma_pago_id,
                pago.banco_id,
                pago.monto,
                utils::limpiar(pago.referencia_pago.as_deref()),
            )),
            None => errores.push("La Forma de pago no existe".to_string()),
        }
    }

    if let Some((_, monto)) = precio {
        let suma: f64 = datos.pagos.iter().map(|p| p.monto).sum();
        if !datos.pagos.is_empty() && !utils::montos_iguales(suma, monto) {
            errores.push(format!(
                "La suma de los pagos ({}) no coincide con el precio ({})",
                utils::formatear_moneda(suma),
                utils::formatear_moneda(monto)
            ));
        }
    }

    if datos.insumos.iter().any(|l| !l.cantidad.is_finite() || l.cantidad <= 0.0) {
        errores.push("Las cantidades de insumos deben ser mayores a 0".to_string());
    }

    if !errores.is_empty() {
        warn!(errores = errores.len(), "activity rejected");
        return Err(AppError::Validacion(errores));
    }

    let id = uuid::Uuid::new_v4().to_string();
    let ahora = db.ahora();
    let tx = conn.transaction()?;

    descontar_stock(&tx, &datos.insumos, &ahora)?;

    tx.execute(
        "INSERT INTO actividades (id, personal_id, cliente_id, procedimiento_id, precio_id, usuario_id, vales, descripcion, estado, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
        rusqlite::params![
            id,
            datos.personal_id,
            if datos.es_vale() { None } else { datos.cliente_id },
            if datos.es_vale() { None } else { datos.procedimiento_id },
            precio.map(|(precio_id, _)| precio_id),
            sesion.usuario_id,
            datos.vales,
            utils::limpiar(datos.descripcion.as_deref()),
            ESTADO_REALIZADA,
            ahora,
        ],
    )?;

    for (forma_pago_id, banco_id, monto, referencia) in &pagos {
        tx.execute(
            "INSERT INTO pagos_actividad (actividad_id, forma_pago_id, banco_id, monto, referencia_pago, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![id, forma_pago_id, banco_id, monto, referencia, ahora],
        )?;
    }

    for linea in &datos.insumos {
        tx.execute(
            "INSERT INTO detalle_actividad (actividad_id, articulo_id, cantidad) VALUES (?1, ?2, ?3)",
            rusqlite::params![id, linea.articulo_id, linea.cantidad],
        )?;
    }

    tx.commit()?;
    info!(actividad_id = %id, vale = datos.es_vale(), "activity created");
    Ok(id)
}

// ============================================
// CONSULTAS
// ============================================

const SELECT_ACTIVIDAD: &str = "SELECT a.id, a.personal_id, p.nombre || ' ' || p.apellidos,
            a.cliente_id, c.nombre || ' ' || c.apellidos, pr.nombre, pc.monto,
            a.vales, a.descripcion, a.estado, u.nombre, a.created_at,
            EXISTS (SELECT 1 FROM facturas f WHERE f.actividad_id = a.id)
     FROM actividades a
     JOIN personal p ON p.id = a.personal_id
     JOIN usuarios u ON u.id = a.usuario_id
     LEFT JOIN clientes c ON c.id = a.cliente_id
     LEFT JOIN procedimientos pr ON pr.id = a.procedimiento_id
     LEFT JOIN precios pc ON pc.id = a.precio_id";

fn mapear(row: &rusqlite::Row) -> rusqlite::Result<Actividad> {
    Ok(Actividad {
        id: row.get(0)?,
        personal_id: row.get(1)?,
        personal: row.get(2)?,
        cliente_id: row.get(3)?,
        cliente: row.get(4)?,
        procedimiento: row.get(5)?,
        precio: row.get(6)?,
        vales: row.get(7)?,
        descripcion: row.get(8)?,
        estado: row.get(9)?,
        usuario: row.get(10)?,
        created_at: row.get(11)?,
        pagos: Vec::new(),
        tiene_factura: row.get(12)?,
    })
}

fn cargar_pagos(conn: &Connection, actividad: &mut Actividad) -> Result<(), AppError> {
    let mut stmt = conn.prepare_cached(
        "SELECT f.nombre, b.nombre, pa.monto, pa.referencia_pago
         FROM pagos_actividad pa
         JOIN formas_pago f ON f.id = pa.forma_pago_id
         LEFT JOIN bancos b ON b.id = pa.banco_id
         WHERE pa.actividad_id = ?1
         ORDER BY pa.id",
    )?;
    actividad.pagos = stmt
        .query_map(rusqlite::params![actividad.id], |row| {
            Ok(PagoActividad {
                forma_pago: row.get(0)?,
                banco: row.get(1)?,
                monto: row.get(2)?,
                referencia_pago: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(())
}

pub fn obtener_actividad(db: &Database, id: &str) -> Result<Actividad, AppError> {
    let conn = db.conn.lock()?;
    let mut actividad = conn
        .query_row(
            &format!("{} WHERE a.id = ?1", SELECT_ACTIVIDAD),
            rusqlite::params![id],
            mapear,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                AppError::NoEncontrado("Actividad no encontrada".into())
            }
            e => e.into(),
        })?;
    cargar_pagos(&conn, &mut actividad)?;
    Ok(actividad)
}

fn filtros_actividades(filtro: &FiltroActividades) -> Filtros {
    let mut filtros = Filtros::default();
    if let Some(texto) = &filtro.buscar {
        filtros.agregar_texto(
            "(p.nombre LIKE ? OR p.apellidos LIKE ? OR c.nombre LIKE ? OR c.apellidos LIKE ?
              OR pr.nombre LIKE ? OR a.descripcion LIKE ?)",
            texto,
        );
    }
    if let Some(id) = filtro.personal_id {
        filtros.agregar("a.personal_id = ?", id);
    }
    if let Some(id) = filtro.cliente_id {
        filtros.agregar("a.cliente_id = ?", id);
    }
    if let Some(id) = filtro.procedimiento_id {
        filtros.agregar("a.procedimiento_id = ?", id);
    }
    if let Some(inicio) = &filtro.fecha_inicio {
        filtros.agregar("date(a.created_at) >= date(?)", inicio.clone());
    }
    if let Some(fin) = &filtro.fecha_fin {
        filtros.agregar("date(a.created_at) <= date(?)", fin.clone());
    }
    filtros
}

const FROM_ACTIVIDADES: &str = "FROM actividades a
     JOIN personal p ON p.id = a.personal_id
     LEFT JOIN clientes c ON c.id = a.cliente_id
     LEFT JOIN procedimientos pr ON pr.id = a.procedimiento_id";

/// Fichas: actividades agrupadas por dia y personal, las mas recientes primero
pub fn listar_fichas(
    db: &Database,
    filtro: &FiltroActividades,
    pagina: i64,
) -> Result<Pagina<Ficha>, AppError> {
    let conn = db.conn.lock()?;
    let filtros = filtros_actividades(filtro);
    let where_sql = filtros.where_sql();
    let params = filtros.refs();

    let total: i64 = conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM (SELECT 1 {} {} GROUP BY date(a.created_at), a.personal_id)",
            FROM_ACTIVIDADES, where_sql
        ),
        params.as_slice(),
        |row| row.get(0),
    )?;

    let (pagina, offset) = utils::paginar(pagina, total, FICHAS_POR_PAGINA);
    let grupos: Vec<(String, i64, String)> = {
        let mut stmt = conn.prepare(&format!(
            "SELECT date(a.created_at) AS dia, a.personal_id, p.nombre || ' ' || p.apellidos
             {} {}
             GROUP BY dia, a.personal_id
             ORDER BY dia DESC, p.nombre
             LIMIT {} OFFSET {}",
            FROM_ACTIVIDADES, where_sql, FICHAS_POR_PAGINA, offset
        ))?;
        let filas = stmt
            .query_map(params.as_slice(), |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        filas
    };

    let mut fichas = Vec::with_capacity(grupos.len());
    for (fecha, personal_id, personal) in grupos {
        let mut filtros_grupo = filtros_actividades(filtro);
        filtros_grupo.agregar("date(a.created_at) = ?", fecha.clone());
        filtros_grupo.agregar("a.personal_id = ?", personal_id);

        let mut stmt = conn.prepare(&format!(
            "{} {} ORDER BY a.created_at",
            SELECT_ACTIVIDAD,
            filtros_grupo.where_sql()
        ))?;
        let mut actividades = stmt
            .query_map(filtros_grupo.refs().as_slice(), mapear)?
            .collect::<Result<Vec<_>, _>>()?;
        for actividad in actividades.iter_mut() {
            cargar_pagos(&conn, actividad)?;
        }

        let (vales, servicios): (Vec<_>, Vec<_>) =
            actividades.into_iter().partition(|a| a.es_vale());
        let total_actividades = servicios
            .iter()
            .filter(|a| !a.anulada())
            .map(|a| a.precio.unwrap_or(0.0))
            .sum();
        let total_vales = vales
            .iter()
            .filter(|a| !a.anulada())
            .map(|a| a.vales)
            .sum();

        fichas.push(Ficha {
            fecha,
            personal_id,
            personal,
            actividades: servicios,
            vales,
            total_actividades,
            total_vales,
        });
    }

    Ok(Pagina {
        items: fichas,
        pagina,
        total_paginas: utils::total_paginas(total, FICHAS_POR_PAGINA),
        total,
    })
}

// ============================================
// ANULAR / ELIMINAR VALE
// ============================================

fn verificar_dia_abierto(conn: &Connection, created_at: &str) -> Result<(), AppError> {
    let cerrado: i64 = conn.query_row(
        "SELECT COUNT(*) FROM cierres_caja WHERE fecha = date(?1) AND estado = 'Consolidado'",
        rusqlite::params![created_at],
        |row| row.get(0),
    )?;
    if cerrado > 0 {
        return Err(AppError::Conflicto(
            "La caja de ese dia ya fue cerrada; anule el cierre primero".into(),
        ));
    }
    Ok(())
}

fn lineas_insumo(conn: &Connection, actividad_id: &str) -> Result<Vec<LineaInsumo>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT articulo_id, cantidad FROM detalle_actividad WHERE actividad_id = ?1",
    )?;
    let lineas = stmt
        .query_map(rusqlite::params![actividad_id], |row| {
            Ok(LineaInsumo {
                articulo_id: row.get(0)?,
                cantidad: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(lineas)
}

/// Solo Admin. Devuelve los insumos al stock y deja auditoria.
pub fn anular_actividad(db: &Database, sesion: &SesionActiva, id: &str) -> Result<(), AppError> {
    verificar_admin(sesion)?;
    let mut conn = db.conn.lock()?;
    let ahora = db.ahora();
    let tx = conn.transaction()?;

    let (estado, created_at): (String, String) = tx
        .query_row(
            "SELECT estado, created_at FROM actividades WHERE id = ?1",
            rusqlite::params![id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                AppError::NoEncontrado("Actividad no encontrada".into())
            }
            e => e.into(),
        })?;
    if estado == ESTADO_ANULADA {
        return Err(AppError::Conflicto("La actividad ya esta anulada".into()));
    }
    verificar_dia_abierto(&tx, &created_at)?;

    let lineas = lineas_insumo(&tx, id)?;
    devolver_stock(&tx, &lineas, &ahora)?;
    tx.execute(
        "UPDATE actividades SET estado = ?1, updated_at = ?2 WHERE id = ?3",
        rusqlite::params![ESTADO_ANULADA, ahora, id],
    )?;
    registrar(
        &tx,
        "ANULAR",
        "actividades",
        id,
        &format!("Actividad del {} anulada", &created_at[..10.min(created_at.len())]),
        sesion.usuario_id,
        &ahora,
    )?;
    tx.commit()?;
    info!(actividad_id = id, "activity voided");
    Ok(())
}

/// Solo Admin. Borra una actividad que sea un vale.
pub fn eliminar_vale(db: &Database, sesion: &SesionActiva, id: &str) -> Result<(), AppError> {
    verificar_admin(sesion)?;
    let mut conn = db.conn.lock()?;
    let ahora = db.ahora();
    let tx = conn.transaction()?;

    let (vales, personal, created_at): (f64, String, String) = tx
        .query_row(
            "SELECT a.vales, p.nombre || ' ' || p.apellidos, a.created_at
             FROM actividades a JOIN personal p ON p.id = a.personal_id
             WHERE a.id = ?1 AND a.vales > 0 AND a.procedimiento_id IS NULL",
            rusqlite::params![id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                AppError::NoEncontrado("Vale no encontrado".into())
            }
            e => e.into(),
        })?;
    verificar_dia_abierto(&tx, &created_at)?;

    tx.execute("DELETE FROM actividades WHERE id = ?1", rusqlite::params![id])?;
    registrar(
        &tx,
        "ELIMINAR",
        "actividades",
        id,
        &format!("Vale de {} eliminado a {}", utils::formatear_moneda(vales), personal),
        sesion.usuario_id,
        &ahora,
    )?;
    tx.commit()?;
    info!(actividad_id = id, "voucher deleted");
    Ok(())
}

// ============================================
// PAGOS DEL PERSONAL
// ============================================

/// Rango por defecto: hoy
fn rango(db: &Database, filtro: &FiltroActividades) -> (String, String) {
    let hoy = db.hoy().format("%Y-%m-%d").to_string();
    let inicio = filtro.fecha_inicio.clone().unwrap_or_else(|| hoy.clone());
    let fin = filtro.fecha_fin.clone().unwrap_or(hoy);
    (inicio, fin)
}

/// Ganancia por personal: comision sobre servicios realizados menos vales
pub fn pagos_personal(
    db: &Database,
    filtro: &FiltroActividades,
    pagina: i64,
) -> Result<(Pagina<PagoPersonal>, TotalesPagos), AppError> {
    let (inicio, fin) = rango(db, filtro);
    let conn = db.conn.lock()?;
    let mut stmt = conn.prepare(
        "SELECT p.id, p.nombre || ' ' || p.apellidos, p.porcentaje_comision,
                COUNT(a.procedimiento_id),
                COALESCE(SUM(CASE WHEN a.procedimiento_id IS NOT NULL THEN pc.monto END), 0),
                COALESCE(SUM(a.vales), 0)
         FROM actividades a
         JOIN personal p ON p.id = a.personal_id
         LEFT JOIN precios pc ON pc.id = a.precio_id
         WHERE a.estado = 'Realizada'
           AND date(a.created_at) BETWEEN date(?1) AND date(?2)
           AND (?3 IS NULL OR a.personal_id = ?3)
         GROUP BY p.id
         ORDER BY p.nombre, p.apellidos",
    )?;
    let filas = stmt
        .query_map(rusqlite::params![inicio, fin, filtro.personal_id], |row| {
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

    let totales = filas.iter().fold(TotalesPagos::default(), |mut t, f| {
        t.total_facturado += f.total_facturado;
        t.ganancia += f.ganancia;
        t.vales += f.vales;
        t.neto += f.neto;
        t
    });

    let total = filas.len() as i64;
    let (pagina, offset) = utils::paginar(pagina, total, PAGOS_POR_PAGINA);
    let items = filas
        .into_iter()
        .skip(offset as usize)
        .take(PAGOS_POR_PAGINA as usize)
        .collect();

    Ok((
        Pagina {
            items,
            pagina,
            total_paginas: utils::total_paginas(total, PAGOS_POR_PAGINA),
            total,
        },
        totales,
    ))
}

/// Detalle de servicios con la parte del personal y del negocio (exportacion)
pub fn servicios_pagados(
    db: &Database,
    filtro: &FiltroActividades,
) -> Result<Vec<ServicioPagado>, AppError> {
    let (inicio, fin) = rango(db, filtro);
    let conn = db.conn.lock()?;
    let mut stmt = conn.prepare(
        "SELECT a.created_at, p.nombre || ' ' || p.apellidos, pr.nombre, pc.monto, p.porcentaje_comision
         FROM actividades a
         JOIN personal p ON p.id = a.personal_id
         JOIN procedimientos pr ON pr.id = a.procedimiento_id
         JOIN precios pc ON pc.id = a.precio_id
         WHERE a.estado = 'Realizada'
           AND date(a.created_at) BETWEEN date(?1) AND date(?2)
           AND (?3 IS NULL OR a.personal_id = ?3)
         ORDER BY a.created_at, p.nombre",
    )?;
    let servicios = stmt
        .query_map(rusqlite::params![inicio, fin, filtro.personal_id], |row| {
            let monto: f64 = row.get(3)?;
            let porcentaje: f64 = row.get(4)?;
            let parte_personal = monto * porcentaje / 100.0;
            Ok(ServicioPagado {
                fecha: row.get(0)?,
                personal: row.get(1)?,
                procedimiento: row.get(2)?,
                monto,
                parte_personal,
                parte_negocio: monto - parte_personal,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(servicios)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{caja, pruebas};
    use crate::models::{NuevoCierre, NuevoPago};

    struct Escenario {
        db: Database,
        personal: i64,
        cliente: i64,
        procedimiento: i64,
        efectivo: i64,
        datafono: i64,
        articulo: i64,
    }

    fn escenario() -> Escenario {
        let db = Database::en_memoria().unwrap();
        let personal = pruebas::personal(&db, "SOFIA", "sofia@spa.co");
        let cliente = pruebas::cliente(&db, "ANA", "1010");
        let (procedimiento, _) = pruebas::procedimiento(&db, "MANICURA", 30000.0);
        let efectivo = pruebas::forma_pago(&db, "Efectivo");
        let datafono = pruebas::forma_pago(&db, "Datafono");
        let articulo = pruebas::articulo(&db, "ESMALTE", 2.0);
        Escenario {
            db,
            personal,
            cliente,
            procedimiento,
            efectivo,
            datafono,
            articulo,
        }
    }

    fn servicio(e: &Escenario) -> NuevaActividad {
        NuevaActividad {
            personal_id: Some(e.personal),
            cliente_id: Some(e.cliente),
            procedimiento_id: Some(e.procedimiento),
            precio_id: None,
            vales: 0.0,
            descripcion: None,
            pagos: vec![
                NuevoPago {
                    forma_pago_id: e.efectivo,
                    banco_id: Some(99),
                    monto: 10000.0,
                    referencia_pago: Some("no aplica".into()),
                },
                NuevoPago {
                    forma_pago_id: e.datafono,
                    banco_id: None,
                    monto: 20000.0,
                    referencia_pago: Some("APROB-1".into()),
                },
            ],
            insumos: vec![LineaInsumo {
                articulo_id: e.articulo,
                cantidad: 0.5,
            }],
        }
    }

    fn vale(e: &Escenario, monto: f64) -> NuevaActividad {
        NuevaActividad {
            personal_id: Some(e.personal),
            vales: monto,
            descripcion: Some("Adelanto".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_crear_servicio_descuenta_stock_y_limpia_pago_efectivo() {
        let e = escenario();
        let id = crear_actividad(&e.db, &pruebas::admin(), &servicio(&e)).unwrap();
        assert_eq!(id.len(), 36);

        let a = obtener_actividad(&e.db, &id).unwrap();
        assert_eq!(a.precio, Some(30000.0));
        assert_eq!(a.estado, ESTADO_REALIZADA);
        assert_eq!(a.pagos.len(), 2);
        assert_eq!(a.pagos[0].forma_pago, "Efectivo");
        assert_eq!(a.pagos[0].banco, None);
        assert_eq!(a.pagos[0].referencia_pago, None);
        assert_eq!(a.pagos[1].referencia_pago.as_deref(), Some("APROB-1"));
        assert!((pruebas::stock(&e.db, e.articulo) - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_pagos_deben_sumar_el_precio() {
        let e = escenario();
        let mut datos = servicio(&e);
        datos.pagos[1].monto = 15000.0;
        match crear_actividad(&e.db, &pruebas::admin(), &datos).unwrap_err() {
            AppError::Validacion(errores) => {
                assert!(errores[0].contains("no coincide"));
            }
            otro => panic!("error inesperado: {otro:?}"),
        }
        assert_eq!(pruebas::contar(&e.db, "SELECT COUNT(*) FROM actividades"), 0);
    }

    #[test]
    fn test_stock_insuficiente_no_escribe_nada() {
        let e = escenario();
        let mut datos = servicio(&e);
        datos.insumos[0].cantidad = 3.0;
        match crear_actividad(&e.db, &pruebas::admin(), &datos).unwrap_err() {
            AppError::Validacion(errores) => {
                assert_eq!(errores, vec!["Cantidad para \"ESMALTE\" supera el stock".to_string()]);
            }
            otro => panic!("error inesperado: {otro:?}"),
        }
        assert_eq!(pruebas::contar(&e.db, "SELECT COUNT(*) FROM actividades"), 0);
        assert_eq!(pruebas::contar(&e.db, "SELECT COUNT(*) FROM pagos_actividad"), 0);
        assert!((pruebas::stock(&e.db, e.articulo) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_servicio_sin_datos_obligatorios() {
        let e = escenario();
        let datos = NuevaActividad::default();
        match crear_actividad(&e.db, &pruebas::admin(), &datos).unwrap_err() {
            AppError::Validacion(errores) => assert_eq!(errores.len(), 4),
            otro => panic!("error inesperado: {otro:?}"),
        }
    }

    #[test]
    fn test_vale_requiere_descripcion() {
        let e = escenario();
        let mut datos = vale(&e, 5000.0);
        datos.descripcion = Some("  ".into());
        assert!(matches!(
            crear_actividad(&e.db, &pruebas::admin(), &datos),
            Err(AppError::Validacion(_))
        ));
        let id = crear_actividad(&e.db, &pruebas::admin(), &vale(&e, 5000.0)).unwrap();
        assert!(obtener_actividad(&e.db, &id).unwrap().es_vale());
    }

    #[test]
    fn test_fichas_agrupan_y_totalizan() {
        let e = escenario();
        let admin = pruebas::admin();
        let id = crear_actividad(&e.db, &admin, &servicio(&e)).unwrap();
        crear_actividad(&e.db, &admin, &servicio(&e)).unwrap();
        crear_actividad(&e.db, &admin, &vale(&e, 5000.0)).unwrap();
        anular_actividad(&e.db, &admin, &id).unwrap();

        let pagina = listar_fichas(&e.db, &FiltroActividades::default(), 1).unwrap();
        assert_eq!(pagina.total, 1);
        let ficha = &pagina.items[0];
        assert_eq!(ficha.actividades.len(), 2);
        assert_eq!(ficha.vales.len(), 1);
        assert_eq!(ficha.total_actividades, 30000.0);
        assert_eq!(ficha.total_vales, 5000.0);
    }

    #[test]
    fn test_fichas_filtran_por_texto() {
        let e = escenario();
        crear_actividad(&e.db, &pruebas::admin(), &servicio(&e)).unwrap();
        let filtro = FiltroActividades {
            buscar: Some("pedicura".into()),
            ..Default::default()
        };
        assert_eq!(listar_fichas(&e.db, &filtro, 1).unwrap().total, 0);
        let filtro = FiltroActividades {
            buscar: Some("manic".into()),
            ..Default::default()
        };
        assert_eq!(listar_fichas(&e.db, &filtro, 1).unwrap().total, 1);
    }

    #[test]
    fn test_anular_devuelve_stock_y_audita() {
        let e = escenario();
        let id = crear_actividad(&e.db, &pruebas::admin(), &servicio(&e)).unwrap();

        assert!(matches!(
            anular_actividad(&e.db, &pruebas::empleado(), &id),
            Err(AppError::NoAutorizado)
        ));
        anular_actividad(&e.db, &pruebas::admin(), &id).unwrap();
        assert!((pruebas::stock(&e.db, e.articulo) - 2.0).abs() < 1e-9);
        assert!(obtener_actividad(&e.db, &id).unwrap().anulada());
        assert_eq!(
            pruebas::contar(&e.db, "SELECT COUNT(*) FROM auditoria WHERE accion = 'ANULAR'"),
            1
        );
        assert!(matches!(
            anular_actividad(&e.db, &pruebas::admin(), &id),
            Err(AppError::Conflicto(_))
        ));
    }

    #[test]
    fn test_no_anula_con_caja_cerrada() {
        let e = escenario();
        let id = crear_actividad(&e.db, &pruebas::admin(), &servicio(&e)).unwrap();
        {
            let conn = e.db.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO cierres_caja (fecha, usuario_id, created_at, updated_at)
                 SELECT date(created_at), 1, created_at, created_at FROM actividades WHERE id = ?1",
                rusqlite::params![id],
            )
            .unwrap();
        }
        assert!(matches!(
            anular_actividad(&e.db, &pruebas::admin(), &id),
            Err(AppError::Conflicto(_))
        ));
    }

    #[test]
    fn test_eliminar_vale_solo_vales() {
        let e = escenario();
        let servicio_id = crear_actividad(&e.db, &pruebas::admin(), &servicio(&e)).unwrap();
        let vale_id = crear_actividad(&e.db, &pruebas::admin(), &vale(&e, 5000.0)).unwrap();

        assert!(matches!(
            eliminar_vale(&e.db, &pruebas::admin(), &servicio_id),
            Err(AppError::NoEncontrado(_))
        ));
        eliminar_vale(&e.db, &pruebas::admin(), &vale_id).unwrap();
        assert_eq!(pruebas::contar(&e.db, "SELECT COUNT(*) FROM actividades"), 1);
    }

    #[test]
    fn test_no_elimina_vale_con_caja_cerrada() {
        let e = escenario();
        let vale_id = crear_actividad(&e.db, &pruebas::admin(), &vale(&e, 5000.0)).unwrap();
        let cierre = NuevoCierre {
            fecha: e.db.hoy().format("%Y-%m-%d").to_string(),
            total_efectivo_contado: 0.0,
            ..Default::default()
        };
        let cierre_id = caja::guardar_cierre(&e.db, &pruebas::admin(), &cierre).unwrap();

        assert!(matches!(
            eliminar_vale(&e.db, &pruebas::admin(), &vale_id),
            Err(AppError::Conflicto(_))
        ));
        assert_eq!(pruebas::contar(&e.db, "SELECT COUNT(*) FROM actividades"), 1);

        caja::anular_cierre(&e.db, &pruebas::admin(), cierre_id).unwrap();
        eliminar_vale(&e.db, &pruebas::admin(), &vale_id).unwrap();
        assert_eq!(pruebas::contar(&e.db, "SELECT COUNT(*) FROM actividades"), 0);
    }

    #[test]
    fn test_montos_no_finitos_son_invalidos() {
        let e = escenario();
        for monto in [f64::INFINITY, f64::NAN] {
            assert!(matches!(
                crear_actividad(&e.db, &pruebas::admin(), &vale(&e, monto)),
                Err(AppError::Validacion(_))
            ));

            let mut pago_infinito = servicio(&e);
            pago_infinito.pagos[1].monto = monto;
            assert!(matches!(
                crear_actividad(&e.db, &pruebas::admin(), &pago_infinito),
                Err(AppError::Validacion(_))
            ));

            let mut insumo_infinito = servicio(&e);
            insumo_infinito.insumos[0].cantidad = monto;
            assert!(matches!(
                crear_actividad(&e.db, &pruebas::admin(), &insumo_infinito),
                Err(AppError::Validacion(_))
            ));
        }
        assert_eq!(pruebas::contar(&e.db, "SELECT COUNT(*) FROM actividades"), 0);
        assert_eq!(pruebas::stock(&e.db, e.articulo), 2.0);
    }

    #[test]
    fn test_pagos_personal_descuenta_vales() {
        let e = escenario();
        crear_actividad(&e.db, &pruebas::admin(), &servicio(&e)).unwrap();
        crear_actividad(&e.db, &pruebas::admin(), &vale(&e, 5000.0)).unwrap();

        let (pagina, totales) =
            pagos_personal(&e.db, &FiltroActividades::default(), 1).unwrap();
        assert_eq!(pagina.items.len(), 1);
        let fila = &pagina.items[0];
        assert_eq!(fila.servicios, 1);
        assert_eq!(fila.total_facturado, 30000.0);
        assert_eq!(fila.ganancia, 15000.0);
        assert_eq!(fila.neto, 10000.0);
        assert_eq!(totales.neto, 10000.0);

        let servicios = servicios_pagados(&e.db, &FiltroActividades::default()).unwrap();
        assert_eq!(servicios.len(), 1);
        assert_eq!(servicios[0].parte_negocio, 15000.0);
    }
}
