use std::collections::BTreeMap;

use rusqlite::Connection;
use tracing::{info, warn};

use super::auditoria::registrar;
use super::{paginar, verificar_admin, Filtros};
use crate::db::Database;
use crate::error::AppError;
use crate::models::{
    Articulo, ArticuloBusqueda, Categoria, DatosArticulo, DatosCategoria, FiltroArticulos,
    ItemCatalogo, LineaInsumo, Pagina, SesionActiva, UnidadMedida,
};

pub const POR_PAGINA: i64 = 12;
const LIMITE_BUSQUEDA: i64 = 10;

// ============================================
// CATEGORIAS Y UNIDADES
// ============================================

pub fn listar_categorias(db: &Database) -> Result<Vec<Categoria>, AppError> {
    let conn = db.conn.lock()?;
    let mut stmt = conn.prepare(
        "SELECT id, nombre, descripcion, afecta_stock, activo FROM categorias ORDER BY nombre",
    )?;
    let categorias = stmt
        .query_map([], |row| {
            Ok(Categoria {
                id: row.get(0)?,
                nombre: row.get(1)?,
                descripcion: row.get(2)?,
                afecta_stock: row.get(3)?,
                activo: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(categorias)
}

pub fn crear_categoria(db: &Database, datos: &DatosCategoria) -> Result<i64, AppError> {
    let nombre = datos.nombre.trim().to_uppercase();
    if nombre.is_empty() {
        return Err(AppError::validacion("El Nombre de la categoria es Obligatorio"));
    }
    let conn = db.conn.lock()?;
    let existe: i64 = conn.query_row(
        "SELECT COUNT(*) FROM categorias WHERE nombre = ?1",
        rusqlite::params![nombre],
        |row| row.get(0),
    )?;
    if existe > 0 {
        return Err(AppError::validacion("La Categoria ya existe"));
    }
    conn.execute(
        "INSERT INTO categorias (nombre, descripcion, afecta_stock, activo) VALUES (?1, ?2, ?3, 1)",
        rusqlite::params![
            nombre,
            crate::utils::limpiar(datos.descripcion.as_deref()),
            datos.afecta_stock
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn listar_unidades(db: &Database) -> Result<Vec<UnidadMedida>, AppError> {
    let conn = db.conn.lock()?;
    let mut stmt = conn.prepare("SELECT id, nombre, abreviatura FROM unidades_medida ORDER BY nombre")?;
    let unidades = stmt
        .query_map([], |row| {
            Ok(UnidadMedida {
                id: row.get(0)?,
                nombre: row.get(1)?,
                abreviatura: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(unidades)
}

// ============================================
// ARTICULOS
// ============================================

const SELECT_ARTICULO: &str = "SELECT a.id, a.nombre, a.descripcion, a.categoria_id, c.nombre,
            a.unidad_medida_id, u.abreviatura, a.stock_minimo, a.stock_actual,
            a.costo_unitario, a.activo
     FROM articulos a
     JOIN categorias c ON c.id = a.categoria_id
     JOIN unidades_medida u ON u.id = a.unidad_medida_id";

fn mapear(row: &rusqlite::Row) -> rusqlite::Result<Articulo> {
    Ok(Articulo {
        id: row.get(0)?,
        nombre: row.get(1)?,
        descripcion: row.get(2)?,
        categoria_id: row.get(3)?,
        categoria: row.get(4)?,
        unidad_medida_id: row.get(5)?,
        unidad: row.get(6)?,
        stock_minimo: row.get(7)?,
        stock_actual: row.get(8)?,
        costo_unitario: row.get(9)?,
        activo: row.get(10)?,
    })
}

fn filtros_articulos(filtro: &FiltroArticulos) -> Filtros {
    let mut filtros = Filtros::default();
    if let Some(texto) = &filtro.busqueda {
        filtros.agregar_texto("(a.nombre LIKE ? OR a.descripcion LIKE ?)", texto);
    }
    if let Some(categoria_id) = filtro.categoria_id {
        filtros.agregar("a.categoria_id = ?", categoria_id);
    }
    filtros
}

pub fn listar_articulos(
    db: &Database,
    filtro: &FiltroArticulos,
    pagina: i64,
) -> Result<Pagina<Articulo>, AppError> {
    let conn = db.conn.lock()?;
    let filtros = filtros_articulos(filtro);
    let where_sql = filtros.where_sql();
    let params = filtros.refs();

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM articulos a {}", where_sql),
        params.as_slice(),
        |row| row.get(0),
    )?;

    paginar(
        |limite, offset| {
            let mut stmt = conn.prepare(&format!(
                "{} {} ORDER BY a.nombre LIMIT {} OFFSET {}",
                SELECT_ARTICULO, where_sql, limite, offset
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

/// Todos los articulos que cumplen el filtro (exportacion)
pub fn articulos_filtrados(db: &Database, filtro: &FiltroArticulos) -> Result<Vec<Articulo>, AppError> {
    let conn = db.conn.lock()?;
    let filtros = filtros_articulos(filtro);
    let mut stmt = conn.prepare(&format!(
        "{} {} ORDER BY a.nombre",
        SELECT_ARTICULO,
        filtros.where_sql()
    ))?;
    let items = stmt
        .query_map(filtros.refs().as_slice(), mapear)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(items)
}

pub fn opciones_articulos(db: &Database) -> Result<Vec<ItemCatalogo>, AppError> {
    let conn = db.conn.lock()?;
    let mut stmt = conn.prepare(
        "SELECT a.id, a.nombre || ' (' || a.stock_actual || ' ' || u.abreviatura || ')'
         FROM articulos a JOIN unidades_medida u ON u.id = a.unidad_medida_id
         WHERE a.activo = 1 ORDER BY a.nombre",
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

pub fn obtener_articulo(db: &Database, id: i64) -> Result<Articulo, AppError> {
    let conn = db.conn.lock()?;
    conn.query_row(
        &format!("{} WHERE a.id = ?1", SELECT_ARTICULO),
        rusqlite::params![id],
        mapear,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => AppError::NoEncontrado("Articulo no encontrado".into()),
        e => e.into(),
    })
}

/// Buscador para los formularios: activos cuyo nombre o descripcion contiene el termino
pub fn buscar_articulos(db: &Database, termino: &str) -> Result<Vec<ArticuloBusqueda>, AppError> {
    let termino = termino.trim();
    if termino.is_empty() {
        return Ok(Vec::new());
    }
    let conn = db.conn.lock()?;
    let mut stmt = conn.prepare(
        "SELECT a.id, a.nombre, a.descripcion, a.stock_actual, u.abreviatura
         FROM articulos a JOIN unidades_medida u ON u.id = a.unidad_medida_id
         WHERE a.activo = 1 AND (a.nombre LIKE ?1 OR a.descripcion LIKE ?1)
         ORDER BY a.nombre
         LIMIT ?2",
    )?;
    let items = stmt
        .query_map(
            rusqlite::params![format!("%{}%", termino), LIMITE_BUSQUEDA],
            |row| {
                Ok(ArticuloBusqueda {
                    id: row.get(0)?,
                    nombre: row.get(1)?,
                    descripcion: row.get(2)?,
                    stock_actual: row.get(3)?,
                    unidad: row.get(4)?,
                })
            },
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(items)
}

struct ArticuloValidado {
    nombre: String,
    stock_minimo: i64,
    stock_actual: f64,
}

fn validar(
    conn: &Connection,
    datos: &DatosArticulo,
    excepto: Option<i64>,
) -> Result<ArticuloValidado, AppError> {
    let mut errores = Vec::new();
    let nombre = datos.nombre.trim().to_uppercase();
    if nombre.is_empty() {
        errores.push("El Nombre es Obligatorio".to_string());
    } else {
        let en_uso: i64 = conn.query_row(
            "SELECT COUNT(*) FROM articulos WHERE nombre = ?1 AND id != COALESCE(?2, -1)",
            rusqlite::params![nombre, excepto],
            |row| row.get(0),
        )?;
        if en_uso > 0 {
            errores.push("El Articulo ya existe".to_string());
        }
    }
    if datos.categoria_id.is_none() {
        errores.push("La Categoria es Obligatoria".to_string());
    }
    if datos.unidad_medida_id.is_none() {
        errores.push("La Unidad de medida es Obligatoria".to_string());
    }
    let stock_minimo = match datos.stock_minimo.trim().parse::<i64>() {
        Ok(v) if v >= 0 => v,
        _ => {
            errores.push("El Stock minimo debe ser un entero mayor o igual a 0".to_string());
            0
        }
    };
    let stock_actual = match crate::utils::parse_numero(&datos.stock_actual) {
        Some(v) if v >= 0.0 => (v * 1000.0).round() / 1000.0,
        _ => {
            errores.push("El Stock actual debe ser un numero mayor o igual a 0".to_string());
            0.0
        }
    };

    if errores.is_empty() {
        Ok(ArticuloValidado {
            nombre,
            stock_minimo,
            stock_actual,
        })
    } else {
        Err(AppError::Validacion(errores))
    }
}

pub fn crear_articulo(db: &Database, datos: &DatosArticulo) -> Result<i64, AppError> {
    let conn = db.conn.lock()?;
    let v = validar(&conn, datos, None)?;
    conn.execute(
        "INSERT INTO articulos (nombre, descripcion, categoria_id, unidad_medida_id, stock_minimo, stock_actual, activo, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?7)",
        rusqlite::params![
            v.nombre,
            crate::utils::limpiar(datos.descripcion.as_deref()),
            datos.categoria_id,
            datos.unidad_medida_id,
            v.stock_minimo,
            v.stock_actual,
            db.ahora(),
        ],
    )?;
    let id = conn.last_insert_rowid();
    info!(articulo_id = id, "article created");
    Ok(id)
}

/// Solo Admin
pub fn actualizar_articulo(
    db: &Database,
    sesion: &SesionActiva,
    id: i64,
    datos: &DatosArticulo,
) -> Result<(), AppError> {
    verificar_admin(sesion)?;
    let conn = db.conn.lock()?;
    let v = validar(&conn, datos, Some(id))?;
    let filas = conn.execute(
        "UPDATE articulos SET nombre = ?1, descripcion = ?2, categoria_id = ?3, unidad_medida_id = ?4,
                stock_minimo = ?5, stock_actual = ?6, activo = ?7, updated_at = ?8
         WHERE id = ?9",
        rusqlite::params![
            v.nombre,
            crate::utils::limpiar(datos.descripcion.as_deref()),
            datos.categoria_id,
            datos.unidad_medida_id,
            v.stock_minimo,
            v.stock_actual,
            datos.activo,
            db.ahora(),
            id,
        ],
    )?;
    if filas == 0 {
        return Err(AppError::NoEncontrado("Articulo no encontrado".into()));
    }
    Ok(())
}

/// Solo Admin. Se rechaza mientras compras, consumos o actividades usen el articulo.
pub fn eliminar_articulo(db: &Database, sesion: &SesionActiva, id: i64) -> Result<(), AppError> {
    verificar_admin(sesion)?;
    let mut conn = db.conn.lock()?;
    let ahora = db.ahora();
    let tx = conn.transaction()?;

    let nombre: String = tx
        .query_row(
            "SELECT nombre FROM articulos WHERE id = ?1",
            rusqlite::params![id],
            |row| row.get(0),
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                AppError::NoEncontrado("Articulo no encontrado".into())
            }
            e => e.into(),
        })?;
    let referencias: i64 = tx.query_row(
        "SELECT (SELECT COUNT(*) FROM detalle_gasto_adicional WHERE articulo_id = ?1)
              + (SELECT COUNT(*) FROM detalle_gasto_administrativo WHERE articulo_id = ?1)
              + (SELECT COUNT(*) FROM detalle_actividad WHERE articulo_id = ?1)",
        rusqlite::params![id],
        |row| row.get(0),
    )?;
    if referencias > 0 {
        warn!(articulo_id = id, referencias, "article delete rejected");
        return Err(AppError::Conflicto(format!(
            "El articulo \"{}\" tiene compras o consumos registrados; desactivelo en su lugar",
            nombre
        )));
    }

    tx.execute("DELETE FROM articulos WHERE id = ?1", rusqlite::params![id])?;
    registrar(
        &tx,
        "ELIMINAR",
        "articulos",
        &id.to_string(),
        &format!("Articulo eliminado: {}", nombre),
        sesion.usuario_id,
        &ahora,
    )?;
    tx.commit()?;
    info!(articulo_id = id, "article deleted");
    Ok(())
}

// ============================================
// MOVIMIENTOS DE STOCK (dentro de transacciones)
// ============================================

/// Suma las cantidades por articulo
fn agrupar(lineas: &[LineaInsumo]) -> BTreeMap<i64, f64> {
    let mut por_articulo = BTreeMap::new();
    for linea in lineas {
        *por_articulo.entry(linea.articulo_id).or_insert(0.0) += linea.cantidad;
    }
    por_articulo
}

/// Verifica que haya stock para todas las lineas; reporta todos los faltantes juntos
pub(crate) fn verificar_stock(conn: &Connection, lineas: &[LineaInsumo]) -> Result<(), AppError> {
    let mut errores = Vec::new();
    for (articulo_id, cantidad) in agrupar(lineas) {
        let fila = conn.query_row(
            "SELECT nombre, stock_actual FROM articulos WHERE id = ?1",
            rusqlite::params![articulo_id],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?)),
        );
        match fila {
            Ok((nombre, stock)) => {
                if cantidad > stock + 1e-9 {
                    errores.push(format!("Cantidad para \"{}\" supera el stock", nombre));
                }
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                errores.push(format!("El articulo {} no existe", articulo_id));
            }
            Err(e) => return Err(e.into()),
        }
    }
    if errores.is_empty() {
        Ok(())
    } else {
        warn!(faltantes = errores.len(), "stock check failed");
        Err(AppError::Validacion(errores))
    }
}

/// Descuenta stock tras verificarlo
pub(crate) fn descontar_stock(
    conn: &Connection,
    lineas: &[LineaInsumo],
    ahora: &str,
) -> Result<(), AppError> {
    verificar_stock(conn, lineas)?;
    for (articulo_id, cantidad) in agrupar(lineas) {
        conn.execute(
            "UPDATE articulos SET stock_actual = MAX(ROUND(stock_actual - ?1, 3), 0), updated_at = ?2
             WHERE id = ?3",
            rusqlite::params![cantidad, ahora, articulo_id],
        )?;
    }
    Ok(())
}

/// Devuelve al stock las cantidades de las lineas
pub(crate) fn devolver_stock(
    conn: &Connection,
    lineas: &[LineaInsumo],
    ahora: &str,
) -> Result<(), AppError> {
    for (articulo_id, cantidad) in agrupar(lineas) {
        conn.execute(
            "UPDATE articulos SET stock_actual = ROUND(stock_actual + ?1, 3), updated_at = ?2
             WHERE id = ?3",
            rusqlite::params![cantidad, ahora, articulo_id],
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::pruebas;

    fn datos(nombre: &str, db: &Database) -> DatosArticulo {
        let categoria = listar_categorias(db).unwrap()[0].id;
        let unidad = listar_unidades(db).unwrap()[0].id;
        DatosArticulo {
            nombre: nombre.into(),
            descripcion: Some("Frasco".into()),
            categoria_id: Some(categoria),
            unidad_medida_id: Some(unidad),
            stock_minimo: "2".into(),
            stock_actual: "5.5".into(),
            activo: true,
        }
    }

    #[test]
    fn test_crear_articulo_validaciones() {
        let db = Database::en_memoria().unwrap();
        let id = crear_articulo(&db, &datos("esmalte rojo", &db)).unwrap();
        let a = obtener_articulo(&db, id).unwrap();
        assert_eq!(a.nombre, "ESMALTE ROJO");
        assert_eq!(a.stock_actual, 5.5);
        assert!(!a.stock_bajo());

        let mut malo = datos("Esmalte Rojo", &db);
        malo.stock_minimo = "1.5".into();
        malo.stock_actual = "-1".into();
        match crear_articulo(&db, &malo).unwrap_err() {
            AppError::Validacion(e) => assert_eq!(e.len(), 3),
            e => panic!("error inesperado: {e:?}"),
        }
    }

    #[test]
    fn test_editar_solo_admin() {
        let db = Database::en_memoria().unwrap();
        let id = crear_articulo(&db, &datos("lima", &db)).unwrap();
        assert!(matches!(
            actualizar_articulo(&db, &pruebas::empleado(), id, &datos("lima", &db)),
            Err(AppError::NoAutorizado)
        ));
        actualizar_articulo(&db, &pruebas::admin(), id, &datos("lima fina", &db)).unwrap();
        assert_eq!(obtener_articulo(&db, id).unwrap().nombre, "LIMA FINA");
    }

    #[test]
    fn test_buscar_articulos() {
        let db = Database::en_memoria().unwrap();
        pruebas::articulo(&db, "ACETONA", 3.0);
        pruebas::articulo(&db, "ALGODON", 3.0);
        assert!(buscar_articulos(&db, "  ").unwrap().is_empty());
        let res = buscar_articulos(&db, "aceto").unwrap();
        assert_eq!(res.len(), 1);
        assert_eq!(res[0].nombre, "ACETONA");
    }

    #[test]
    fn test_listar_filtra_por_categoria() {
        let db = Database::en_memoria().unwrap();
        pruebas::articulo(&db, "ACETONA", 3.0);
        let insumos = listar_categorias(&db)
            .unwrap()
            .into_iter()
            .find(|c| c.afecta_stock)
            .unwrap();
        let filtro = FiltroArticulos {
            busqueda: None,
            categoria_id: Some(insumos.id),
        };
        assert_eq!(listar_articulos(&db, &filtro, 1).unwrap().total, 1);
    }

    #[test]
    fn test_descontar_reporta_todos_los_faltantes() {
        let db = Database::en_memoria().unwrap();
        let a = pruebas::articulo(&db, "ACETONA", 1.0);
        let b = pruebas::articulo(&db, "ALGODON", 1.0);
        let conn = db.conn.lock().unwrap();
        let lineas = vec![
            LineaInsumo { articulo_id: a, cantidad: 0.6 },
            LineaInsumo { articulo_id: a, cantidad: 0.6 },
            LineaInsumo { articulo_id: b, cantidad: 2.0 },
        ];
        match descontar_stock(&conn, &lineas, "2026-01-01 10:00:00").unwrap_err() {
            AppError::Validacion(e) => {
                assert_eq!(e.len(), 2);
                assert!(e[0].contains("ACETONA"));
            }
            e => panic!("error inesperado: {e:?}"),
        }
    }

    #[test]
    fn test_descontar_y_devolver() {
        let db = Database::en_memoria().unwrap();
        let a = pruebas::articulo(&db, "ACETONA", 1.0);
        {
            let conn = db.conn.lock().unwrap();
            let lineas = vec![LineaInsumo { articulo_id: a, cantidad: 0.3 }];
            descontar_stock(&conn, &lineas, "2026-01-01 10:00:00").unwrap();
            descontar_stock(&conn, &lineas, "2026-01-01 10:00:00").unwrap();
            devolver_stock(&conn, &lineas, "2026-01-01 10:00:00").unwrap();
        }
        assert!((pruebas::stock(&db, a) - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_eliminar_articulo_sin_movimientos() {
        let db = Database::en_memoria().unwrap();
        let usado = pruebas::articulo(&db, "ALGODON", 5.0);
        let libre = pruebas::articulo(&db, "LIMA", 5.0);
        crate::commands::consumos::crear_consumo(
            &db,
            &pruebas::empleado(),
            &crate::models::NuevoGastoAdministrativo {
                descripcion: "Aseo".into(),
                lineas: vec![LineaInsumo {
                    articulo_id: usado,
                    cantidad: 1.0,
                }],
            },
        )
        .unwrap();

        assert!(matches!(
            eliminar_articulo(&db, &pruebas::empleado(), libre),
            Err(AppError::NoAutorizado)
        ));
        assert!(matches!(
            eliminar_articulo(&db, &pruebas::admin(), usado),
            Err(AppError::Conflicto(_))
        ));
        eliminar_articulo(&db, &pruebas::admin(), libre).unwrap();
        assert!(matches!(
            obtener_articulo(&db, libre),
            Err(AppError::NoEncontrado(_))
        ));
        assert!(matches!(
            eliminar_articulo(&db, &pruebas::admin(), libre),
            Err(AppError::NoEncontrado(_))
        ));
        assert_eq!(
            pruebas::contar(
                &db,
                "SELECT COUNT(*) FROM auditoria WHERE tabla_afectada = 'articulos' AND accion = 'ELIMINAR'"
            ),
            1
        );
    }

    #[test]
    fn test_stock_actual_no_finito() {
        let db = Database::en_memoria().unwrap();
        let mut d = datos("acetona", &db);
        d.stock_actual = "inf".into();
        assert!(matches!(crear_articulo(&db, &d), Err(AppError::Validacion(_))));
    }
}
