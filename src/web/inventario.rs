use std::collections::HashMap;

use axum::extract::{Form, Path, Query, State};
use axum::response::Response;
use axum::Json;

use super::vistas::{opciones, Accion, Campo, Fila, FormularioVista, Layout, Paginacion, TablaVista};
use super::{descarga, o_guion, redirigir, render, render_invalido, si_no, Campos, Consulta};
use crate::commands::{exportar, inventario, verificar_admin};
use crate::error::AppError;
use crate::models::{
    ArticuloBusqueda, DatosArticulo, DatosCategoria, FiltroArticulos, ItemCatalogo, SesionActiva,
};
use crate::utils::{formatear_cantidad, formatear_moneda};
use crate::AppState;

fn filtro(consulta: &Consulta) -> FiltroArticulos {
    FiltroArticulos {
        busqueda: consulta.opcion("busqueda"),
        categoria_id: consulta.id("categoria_id"),
    }
}

fn opciones_categorias(state: &AppState) -> Result<Vec<ItemCatalogo>, AppError> {
    Ok(inventario::listar_categorias(&state.db)?
        .into_iter()
        .filter(|c| c.activo)
        .map(|c| ItemCatalogo {
            id: c.id,
            nombre: c.nombre,
        })
        .collect())
}

pub async fn articulos(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let consulta = Consulta::new(params);
    let filtro = filtro(&consulta);
    let pagina = inventario::listar_articulos(&state.db, &filtro, consulta.pagina())?;
    let filtros_url = consulta.codificada(&["busqueda", "categoria_id"]);

    let mut vista = TablaVista::new(
        Layout::new(&sesion, consulta.mensaje()),
        "Inventario de insumos",
        vec!["Nombre", "Categoria", "Unidad", "Stock", "Minimo", "Costo unitario", "Estado"],
    );
    vista.filtro_accion = "/inventario/articulos".to_string();
    vista.filtros = vec![
        Campo::texto("busqueda", "Buscar", filtro.busqueda.clone().unwrap_or_default()),
        Campo::seleccion(
            "categoria_id",
            "Categoria",
            opciones(&opciones_categorias(&state)?, filtro.categoria_id, Some("Todas")),
        ),
    ];
    vista.paginacion = Some(Paginacion::new(&pagina, "/inventario/articulos", &filtros_url));
    vista.filas = pagina
        .items
        .into_iter()
        .map(|a| {
            let estado = if !a.activo {
                "INACTIVO"
            } else if a.stock_bajo() {
                "STOCK BAJO"
            } else {
                "OK"
            };
            let mut acciones = Vec::new();
            if sesion.es_admin() {
                acciones.push(Accion::enlace("Editar", format!("/inventario/articulos/{}/editar", a.id)));
                acciones.push(Accion::post(
                    "Eliminar",
                    format!("/inventario/articulos/{}/eliminar", a.id),
                    "Se eliminara el articulo",
                ));
            }
            Fila {
                celdas: vec![
                    a.nombre.clone(),
                    a.categoria.clone(),
                    a.unidad.clone(),
                    formatear_cantidad(a.stock_actual),
                    a.stock_minimo.to_string(),
                    formatear_moneda(a.costo_unitario),
                    estado.to_string(),
                ],
                acciones,
            }
        })
        .collect();
    let url_exportar = if filtros_url.is_empty() {
        "/inventario/articulos/exportar".to_string()
    } else {
        format!("/inventario/articulos/exportar?{}", filtros_url)
    };
    vista.botones = vec![
        Accion::enlace("Nuevo articulo", "/inventario/articulos/nuevo"),
        Accion::enlace("Categorias", "/inventario/categorias"),
        Accion::enlace("Exportar a Excel", url_exportar),
    ];
    render(&vista)
}

pub async fn exportar(
    State(state): State<AppState>,
    _sesion: SesionActiva,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let consulta = Consulta::new(params);
    let bytes = exportar::inventario_csv(&state.db, &filtro(&consulta))?;
    let archivo = format!("inventario-{}.csv", state.db.hoy().format("%Y-%m-%d"));
    Ok(descarga(bytes, "text/csv; charset=utf-8", &archivo, true))
}

fn formulario_articulo(
    state: &AppState,
    sesion: &SesionActiva,
    id: Option<i64>,
    d: &DatosArticulo,
) -> Result<FormularioVista, AppError> {
    let unidades: Vec<ItemCatalogo> = inventario::listar_unidades(&state.db)?
        .into_iter()
        .map(|u| ItemCatalogo {
            id: u.id,
            nombre: format!("{} ({})", u.nombre, u.abreviatura),
        })
        .collect();
    let (titulo, accion) = match id {
        Some(id) => ("Editar articulo", format!("/inventario/articulos/{}/editar", id)),
        None => ("Nuevo articulo", "/inventario/articulos/nuevo".to_string()),
    };
    let mut vista =
        FormularioVista::new(Layout::new(sesion, None), titulo, accion, "/inventario/articulos");
    vista.campos = vec![
        Campo::texto("nombre", "Nombre", d.nombre.as_str()).requerido(),
        Campo::texto("descripcion", "Descripcion", d.descripcion.clone().unwrap_or_default())
            .con_tipo("textarea"),
        Campo::seleccion(
            "categoria_id",
            "Categoria",
            opciones(&opciones_categorias(state)?, d.categoria_id, Some("Seleccione...")),
        )
        .requerido(),
        Campo::seleccion(
            "unidad_medida_id",
            "Unidad de medida",
            opciones(&unidades, d.unidad_medida_id, Some("Seleccione...")),
        )
        .requerido(),
        Campo::numero("stock_minimo", "Stock minimo", d.stock_minimo.as_str(), "1").requerido(),
        Campo::numero("stock_actual", "Stock actual", d.stock_actual.as_str(), "0.001").requerido(),
    ];
    if id.is_some() {
        vista.campos.push(Campo::casilla("activo", "Activo", d.activo));
    }
    Ok(vista)
}

fn datos_articulo(campos: &Campos) -> DatosArticulo {
    DatosArticulo {
        nombre: campos.texto("nombre"),
        descripcion: campos.opcion("descripcion"),
        categoria_id: campos.id("categoria_id"),
        unidad_medida_id: campos.id("unidad_medida_id"),
        stock_minimo: campos.texto("stock_minimo"),
        stock_actual: campos.texto("stock_actual"),
        activo: campos.bool("activo"),
    }
}

pub async fn nuevo_articulo(
    State(state): State<AppState>,
    sesion: SesionActiva,
) -> Result<Response, AppError> {
    let datos = DatosArticulo {
        stock_minimo: "0".to_string(),
        stock_actual: "0".to_string(),
        ..Default::default()
    };
    render(&formulario_articulo(&state, &sesion, None, &datos)?)
}

pub async fn crear_articulo(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Form(pares): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let campos = Campos::new(pares);
    campos.verificar_csrf(&sesion)?;
    let datos = datos_articulo(&campos);
    match inventario::crear_articulo(&state.db, &datos) {
        Ok(_) => Ok(redirigir("/inventario/articulos", "creado")),
        Err(AppError::Validacion(errores)) => {
            let mut vista = formulario_articulo(&state, &sesion, None, &datos)?;
            vista.errores = errores;
            render_invalido(&vista)
        }
        Err(e) => Err(e),
    }
}

pub async fn editar_articulo(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    verificar_admin(&sesion)?;
    let a = inventario::obtener_articulo(&state.db, id)?;
    let datos = DatosArticulo {
        nombre: a.nombre,
        descripcion: a.descripcion,
        categoria_id: Some(a.categoria_id),
        unidad_medida_id: Some(a.unidad_medida_id),
        stock_minimo: a.stock_minimo.to_string(),
        stock_actual: formatear_cantidad(a.stock_actual),
        activo: a.activo,
    };
    render(&formulario_articulo(&state, &sesion, Some(id), &datos)?)
}

pub async fn actualizar_articulo(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Path(id): Path<i64>,
    Form(pares): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let campos = Campos::new(pares);
    campos.verificar_csrf(&sesion)?;
    let datos = datos_articulo(&campos);
    match inventario::actualizar_articulo(&state.db, &sesion, id, &datos) {
        Ok(()) => Ok(redirigir("/inventario/articulos", "actualizado")),
        Err(AppError::Validacion(errores)) => {
            let mut vista = formulario_articulo(&state, &sesion, Some(id), &datos)?;
            vista.errores = errores;
            render_invalido(&vista)
        }
        Err(e) => Err(e),
    }
}

// ============================================
// Categorias
// ============================================

pub async fn eliminar_articulo(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Path(id): Path<i64>,
    Form(pares): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    Campos::new(pares).verificar_csrf(&sesion)?;
    inventario::eliminar_articulo(&state.db, &sesion, id)?;
    Ok(redirigir("/inventario/articulos", "eliminado"))
}

pub async fn categorias(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let lista = inventario::listar_categorias(&state.db)?;
    let mut vista = TablaVista::new(
        Layout::new(&sesion, Consulta::new(params).mensaje()),
        "Categorias",
        vec!["Nombre", "Descripcion", "Afecta stock", "Activo"],
    );
    vista.filas = lista
        .into_iter()
        .map(|c| Fila {
            celdas: vec![
                c.nombre.clone(),
                o_guion(c.descripcion.as_deref()),
                si_no(c.afecta_stock),
                si_no(c.activo),
            ],
            acciones: Vec::new(),
        })
        .collect();
    vista.botones = vec![
        Accion::enlace("Nueva categoria", "/inventario/categorias/nueva"),
        Accion::enlace("Volver al inventario", "/inventario/articulos"),
    ];
    render(&vista)
}

fn formulario_categoria(sesion: &SesionActiva, d: &DatosCategoria) -> FormularioVista {
    let mut vista = FormularioVista::new(
        Layout::new(sesion, None),
        "Nueva categoria",
        "/inventario/categorias/nueva",
        "/inventario/categorias",
    );
    vista.campos = vec![
        Campo::texto("nombre", "Nombre", d.nombre.as_str()).requerido(),
        Campo::texto("descripcion", "Descripcion", d.descripcion.clone().unwrap_or_default())
            .con_tipo("textarea"),
        Campo::casilla("afecta_stock", "Las compras aumentan el stock", d.afecta_stock),
    ];
    vista
}

pub async fn nueva_categoria(sesion: SesionActiva) -> Result<Response, AppError> {
    render(&formulario_categoria(&sesion, &DatosCategoria::default()))
}

pub async fn crear_categoria(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Form(pares): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let campos = Campos::new(pares);
    campos.verificar_csrf(&sesion)?;
    let datos = DatosCategoria {
        nombre: campos.texto("nombre"),
        descripcion: campos.opcion("descripcion"),
        afecta_stock: campos.bool("afecta_stock"),
    };
    match inventario::crear_categoria(&state.db, &datos) {
        Ok(_) => Ok(redirigir("/inventario/categorias", "creado")),
        Err(AppError::Validacion(errores)) => {
            let mut vista = formulario_categoria(&sesion, &datos);
            vista.errores = errores;
            render_invalido(&vista)
        }
        Err(e) => Err(e),
    }
}

/// Buscador de articulos para las lineas de insumos
pub async fn buscar(
    State(state): State<AppState>,
    _sesion: SesionActiva,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<ArticuloBusqueda>>, AppError> {
    let termino = Consulta::new(params).texto("termino");
    Ok(Json(inventario::buscar_articulos(&state.db, &termino)?))
}
