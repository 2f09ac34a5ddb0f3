//! Compras a proveedores y consumos internos de insumos.

use std::collections::HashMap;

use axum::extract::{Form, Path, Query, State};
use axum::response::Response;
use axum::Json;

use super::vistas::{opciones, Accion, Campo, Fila, FormularioVista, Layout, Paginacion, SeccionLineas, TablaVista};
use super::{
    filas_enviadas, id_de, o_guion, redirigir, render, render_invalido, rellenar, Campos, Consulta,
};
use crate::commands::{consumos, gastos, inventario, proveedores, verificar_admin, verificar_supervisor};
use crate::error::AppError;
use crate::models::{
    FiltroGastos, GastoAdicional, GastoAdministrativo, LineaCompra, LineaInsumo,
    NuevoGastoAdicional, NuevoGastoAdministrativo, SesionActiva, GASTO_CONSOLIDADO,
};
use crate::utils::{formatear_cantidad, formatear_moneda, parse_numero};
use crate::AppState;

const FILTROS_COMPRAS: [&str; 4] = ["busqueda", "proveedor_id", "fecha_inicio", "fecha_fin"];

fn par(clave: &str, valor: impl ToString) -> (String, String) {
    (clave.to_string(), valor.to_string())
}

// ============================================
// Compras
// ============================================

pub async fn compras(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let consulta = Consulta::new(params);
    let filtro = FiltroGastos {
        busqueda: consulta.opcion("busqueda"),
        proveedor_id: consulta.id("proveedor_id"),
        fecha_inicio: consulta.opcion("fecha_inicio"),
        fecha_fin: consulta.opcion("fecha_fin"),
    };
    let pagina = gastos::listar_gastos(&state.db, &filtro, consulta.pagina())?;

    let mut vista = TablaVista::new(
        Layout::new(&sesion, consulta.mensaje()),
        "Gastos adicionales",
        vec!["Fecha", "Factura", "Proveedor", "Descripcion", "Total", "Estado", "Registrado por"],
    );
    vista.filtro_accion = "/gastos".to_string();
    vista.filtros = vec![
        Campo::texto("busqueda", "Factura o descripcion", filtro.busqueda.clone().unwrap_or_default()),
        Campo::seleccion(
            "proveedor_id",
            "Proveedor",
            opciones(&proveedores::opciones_proveedores(&state.db)?, filtro.proveedor_id, Some("Todos")),
        ),
        Campo::fecha("fecha_inicio", "Desde", filtro.fecha_inicio.clone().unwrap_or_default()),
        Campo::fecha("fecha_fin", "Hasta", filtro.fecha_fin.clone().unwrap_or_default()),
    ];
    vista.paginacion = Some(Paginacion::new(&pagina, "/gastos", &consulta.codificada(&FILTROS_COMPRAS)));
    vista.filas = pagina
        .items
        .into_iter()
        .map(|g| {
            let mut acciones = vec![Accion::enlace("Detalle", format!("/gastos/{}", g.id))];
            if sesion.es_admin() && g.estado == GASTO_CONSOLIDADO {
                acciones.push(Accion::enlace("Editar", format!("/gastos/{}/editar", g.id)));
                acciones.push(Accion::post(
                    "Anular",
                    format!("/gastos/{}/anular", g.id),
                    "Se anulara la compra y se descontara el stock ingresado",
                ));
            }
            Fila {
                celdas: vec![
                    g.fecha_gasto.clone(),
                    g.numero_factura.clone(),
                    g.proveedor.clone(),
                    o_guion(g.descripcion.as_deref()),
                    formatear_moneda(g.valor_total),
                    g.estado.clone(),
                    g.usuario.clone(),
                ],
                acciones,
            }
        })
        .collect();
    vista.botones = vec![Accion::enlace("Registrar compra", "/gastos/nuevo")];
    render(&vista)
}

fn formulario_compra(
    state: &AppState,
    sesion: &SesionActiva,
    id: Option<i64>,
    campos: Option<&Campos>,
) -> Result<FormularioVista, AppError> {
    let valor = |clave: &str| campos.map(|f| f.texto(clave)).unwrap_or_default();
    let proveedores = proveedores::opciones_proveedores(&state.db)?;
    let articulos = inventario::opciones_articulos(&state.db)?;

    let (titulo, accion) = match id {
        Some(id) => ("Editar compra", format!("/gastos/{}/editar", id)),
        None => ("Registrar compra", "/gastos/nuevo".to_string()),
    };
    let mut vista = FormularioVista::new(Layout::new(sesion, None), titulo, accion, "/gastos");
    let fecha = match valor("fecha_gasto") {
        f if f.is_empty() => state.db.hoy().format("%Y-%m-%d").to_string(),
        f => f,
    };
    vista.campos = vec![
        Campo::texto("numero_factura", "Numero de factura", valor("numero_factura")).requerido(),
        Campo::seleccion(
            "proveedor_id",
            "Proveedor",
            opciones(&proveedores, campos.and_then(|f| f.id("proveedor_id")), Some("Seleccione...")),
        )
        .requerido(),
        Campo::fecha("fecha_gasto", "Fecha", fecha).requerido(),
        Campo::texto("descripcion", "Descripcion", valor("descripcion")).con_tipo("textarea"),
    ];

    let lineas = rellenar(
        filas_enviadas(campos, &["articulo_id", "cantidad", "precio_unitario"]),
        3,
    );
    vista.secciones.push(SeccionLineas {
        titulo: "Articulos comprados".to_string(),
        columnas: vec!["Articulo", "Cantidad", "Precio unitario"],
        filas: lineas
            .iter()
            .map(|l| {
                vec![
                    Campo::seleccion("articulo_id", "", opciones(&articulos, id_de(l.first()), Some("-"))),
                    Campo::numero("cantidad", "", l[1].clone(), "0.001"),
                    Campo::numero("precio_unitario", "", l[2].clone(), "0.01"),
                ]
            })
            .collect(),
    });
    Ok(vista)
}

fn datos_compra(campos: &Campos) -> Result<NuevoGastoAdicional, AppError> {
    let mut errores = Vec::new();
    let mut lineas = Vec::new();
    for (i, fila) in campos
        .lineas(&["articulo_id", "cantidad", "precio_unitario"])
        .into_iter()
        .enumerate()
    {
        match (fila[0].parse::<i64>(), parse_numero(fila[1]), parse_numero(fila[2])) {
            (Ok(articulo_id), Some(cantidad), Some(precio_unitario)) => lineas.push(LineaCompra {
                articulo_id,
                cantidad,
                precio_unitario,
            }),
            _ => errores.push(format!(
                "La linea {} debe tener articulo, cantidad y precio unitario",
                i + 1
            )),
        }
    }
    if !errores.is_empty() {
        return Err(AppError::Validacion(errores));
    }
    Ok(NuevoGastoAdicional {
        numero_factura: campos.texto("numero_factura"),
        proveedor_id: campos.id("proveedor_id"),
        fecha_gasto: campos.texto("fecha_gasto"),
        descripcion: campos.opcion("descripcion"),
        lineas,
    })
}

/// Campos equivalentes a una compra guardada, para precargar la edicion
fn campos_compra(g: &GastoAdicional) -> Campos {
    let mut pares = vec![
        par("numero_factura", &g.numero_factura),
        par("proveedor_id", g.proveedor_id),
        par("fecha_gasto", &g.fecha_gasto),
        par("descripcion", g.descripcion.as_deref().unwrap_or_default()),
    ];
    for d in &g.detalles {
        pares.push(par("articulo_id", d.articulo_id));
        pares.push(par("cantidad", formatear_cantidad(d.cantidad)));
        pares.push(par("precio_unitario", d.precio_unitario));
    }
    Campos::new(pares)
}

pub async fn nueva_compra(
    State(state): State<AppState>,
    sesion: SesionActiva,
) -> Result<Response, AppError> {
    render(&formulario_compra(&state, &sesion, None, None)?)
}

pub async fn crear_compra(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Form(pares): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let campos = Campos::new(pares);
    campos.verificar_csrf(&sesion)?;
    match datos_compra(&campos).and_then(|d| gastos::crear_gasto(&state.db, &sesion, &d)) {
        Ok(_) => Ok(redirigir("/gastos", "creado")),
        Err(AppError::Validacion(errores)) => {
            let mut vista = formulario_compra(&state, &sesion, None, Some(&campos))?;
            vista.errores = errores;
            render_invalido(&vista)
        }
        Err(e) => Err(e),
    }
}

pub async fn ver_compra(
    State(state): State<AppState>,
    _sesion: SesionActiva,
    Path(id): Path<i64>,
) -> Result<Json<GastoAdicional>, AppError> {
    Ok(Json(gastos::obtener_gasto(&state.db, id)?))
}

pub async fn editar_compra(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    verificar_admin(&sesion)?;
    let gasto = gastos::obtener_gasto(&state.db, id)?;
    if gasto.estado != GASTO_CONSOLIDADO {
        return Err(AppError::Conflicto("Solo se editan gastos consolidados".into()));
    }
    render(&formulario_compra(&state, &sesion, Some(id), Some(&campos_compra(&gasto)))?)
}

pub async fn actualizar_compra(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Path(id): Path<i64>,
    Form(pares): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let campos = Campos::new(pares);
    campos.verificar_csrf(&sesion)?;
    match datos_compra(&campos).and_then(|d| gastos::editar_gasto(&state.db, &sesion, id, &d)) {
        Ok(()) => Ok(redirigir("/gastos", "actualizado")),
        Err(AppError::Validacion(errores)) => {
            let mut vista = formulario_compra(&state, &sesion, Some(id), Some(&campos))?;
            vista.errores = errores;
            render_invalido(&vista)
        }
        Err(e) => Err(e),
    }
}

pub async fn anular_compra(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Path(id): Path<i64>,
    Form(pares): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    Campos::new(pares).verificar_csrf(&sesion)?;
    gastos::anular_gasto(&state.db, &sesion, id)?;
    Ok(redirigir("/gastos", "anulado"))
}

// ============================================
// Consumos internos
// ============================================

pub async fn consumos(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let consulta = Consulta::new(params);
    let busqueda = consulta.opcion("busqueda");
    let pagina = consumos::listar_consumos(&state.db, busqueda.as_deref(), consulta.pagina())?;

    let mut vista = TablaVista::new(
        Layout::new(&sesion, consulta.mensaje()),
        "Gastos administrativos",
        vec!["Fecha", "Descripcion", "Insumos", "Estado", "Registrado por"],
    );
    vista.filtro_accion = "/gastos-administrativos".to_string();
    vista.filtros = vec![Campo::texto("busqueda", "Descripcion", busqueda.unwrap_or_default())];
    vista.paginacion = Some(Paginacion::new(
        &pagina,
        "/gastos-administrativos",
        &consulta.codificada(&["busqueda"]),
    ));
    vista.filas = pagina
        .items
        .into_iter()
        .map(|g| {
            let insumos = g
                .detalles
                .iter()
                .map(|d| format!("{} {} {}", formatear_cantidad(d.cantidad), d.unidad, d.articulo))
                .collect::<Vec<_>>()
                .join(", ");
            let mut acciones = vec![Accion::enlace("Detalle", format!("/gastos-administrativos/{}", g.id))];
            if g.estado == GASTO_CONSOLIDADO {
                acciones.push(Accion::enlace("Editar", format!("/gastos-administrativos/{}/editar", g.id)));
                if sesion.es_supervisor() {
                    acciones.push(Accion::post(
                        "Anular",
                        format!("/gastos-administrativos/{}/anular", g.id),
                        "Se anulara el consumo y se devolvera el stock",
                    ));
                }
            }
            Fila {
                celdas: vec![
                    g.created_at.clone(),
                    g.descripcion.clone(),
                    insumos,
                    g.estado.clone(),
                    g.usuario.clone(),
                ],
                acciones,
            }
        })
        .collect();
    vista.botones = vec![Accion::enlace("Registrar consumo", "/gastos-administrativos/nuevo")];
    render(&vista)
}

fn formulario_consumo(
    state: &AppState,
    sesion: &SesionActiva,
    id: Option<i64>,
    campos: Option<&Campos>,
) -> Result<FormularioVista, AppError> {
    let articulos = inventario::opciones_articulos(&state.db)?;
    let (titulo, accion) = match id {
        Some(id) => ("Editar consumo", format!("/gastos-administrativos/{}/editar", id)),
        None => ("Registrar consumo", "/gastos-administrativos/nuevo".to_string()),
    };
    let mut vista =
        FormularioVista::new(Layout::new(sesion, None), titulo, accion, "/gastos-administrativos");
    vista.campos = vec![Campo::texto(
        "descripcion",
        "Descripcion",
        campos.map(|f| f.texto("descripcion")).unwrap_or_default(),
    )
    .con_tipo("textarea")
    .requerido()];

    let lineas = rellenar(filas_enviadas(campos, &["articulo_id", "cantidad"]), 2);
    vista.secciones.push(SeccionLineas {
        titulo: "Insumos consumidos".to_string(),
        columnas: vec!["Articulo", "Cantidad"],
        filas: lineas
            .iter()
            .map(|l| {
                vec![
                    Campo::seleccion("articulo_id", "", opciones(&articulos, id_de(l.first()), Some("-"))),
                    Campo::numero("cantidad", "", l[1].clone(), "0.001"),
                ]
            })
            .collect(),
    });
    Ok(vista)
}

fn datos_consumo(campos: &Campos) -> Result<NuevoGastoAdministrativo, AppError> {
    let mut errores = Vec::new();
    let mut lineas = Vec::new();
    for (i, fila) in campos.lineas(&["articulo_id", "cantidad"]).into_iter().enumerate() {
        match (fila[0].parse::<i64>(), parse_numero(fila[1])) {
            (Ok(articulo_id), Some(cantidad)) => lineas.push(LineaInsumo { articulo_id, cantidad }),
            _ => errores.push(format!("La linea {} debe tener articulo y cantidad", i + 1)),
        }
    }
    if !errores.is_empty() {
        return Err(AppError::Validacion(errores));
    }
    Ok(NuevoGastoAdministrativo {
        descripcion: campos.texto("descripcion"),
        lineas,
    })
}

fn campos_consumo(g: &GastoAdministrativo) -> Campos {
    let mut pares = vec![par("descripcion", &g.descripcion)];
    for d in &g.detalles {
        pares.push(par("articulo_id", d.articulo_id));
        pares.push(par("cantidad", formatear_cantidad(d.cantidad)));
    }
    Campos::new(pares)
}

pub async fn nuevo_consumo(
    State(state): State<AppState>,
    sesion: SesionActiva,
) -> Result<Response, AppError> {
    render(&formulario_consumo(&state, &sesion, None, None)?)
}

pub async fn crear_consumo(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Form(pares): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let campos = Campos::new(pares);
    campos.verificar_csrf(&sesion)?;
    match datos_consumo(&campos).and_then(|d| consumos::crear_consumo(&state.db, &sesion, &d)) {
        Ok(_) => Ok(redirigir("/gastos-administrativos", "creado")),
        Err(AppError::Validacion(errores)) => {
            let mut vista = formulario_consumo(&state, &sesion, None, Some(&campos))?;
            vista.errores = errores;
            render_invalido(&vista)
        }
        Err(e) => Err(e),
    }
}

pub async fn ver_consumo(
    State(state): State<AppState>,
    _sesion: SesionActiva,
    Path(id): Path<i64>,
) -> Result<Json<GastoAdministrativo>, AppError> {
    Ok(Json(consumos::obtener_consumo(&state.db, id)?))
}

pub async fn editar_consumo(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let consumo = consumos::obtener_consumo(&state.db, id)?;
    if consumo.estado != GASTO_CONSOLIDADO {
        return Err(AppError::Conflicto("Solo se editan gastos consolidados".into()));
    }
    render(&formulario_consumo(&state, &sesion, Some(id), Some(&campos_consumo(&consumo)))?)
}

pub async fn actualizar_consumo(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Path(id): Path<i64>,
    Form(pares): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let campos = Campos::new(pares);
    campos.verificar_csrf(&sesion)?;
    match datos_consumo(&campos).and_then(|d| consumos::editar_consumo(&state.db, &sesion, id, &d)) {
        Ok(()) => Ok(redirigir("/gastos-administrativos", "actualizado")),
        Err(AppError::Validacion(errores)) => {
            let mut vista = formulario_consumo(&state, &sesion, Some(id), Some(&campos))?;
            vista.errores = errores;
            render_invalido(&vista)
        }
        Err(e) => Err(e),
    }
}

pub async fn anular_consumo(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Path(id): Path<i64>,
    Form(pares): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    Campos::new(pares).verificar_csrf(&sesion)?;
    verificar_supervisor(&sesion)?;
    consumos::anular_consumo(&state.db, &sesion, id)?;
    Ok(redirigir("/gastos-administrativos", "anulado"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn campos(pares: &[(&str, &str)]) -> Campos {
        Campos::new(pares.iter().map(|(k, v)| par(k, v)).collect())
    }

    #[test]
    fn test_lineas_de_compra() {
        let datos = datos_compra(&campos(&[
            ("numero_factura", "FV-12"),
            ("proveedor_id", "3"),
            ("fecha_gasto", "2026-04-10"),
            ("articulo_id", "7"),
            ("cantidad", "2"),
            ("precio_unitario", "15000"),
            ("articulo_id", ""),
            ("cantidad", ""),
            ("precio_unitario", ""),
        ]))
        .unwrap();
        assert_eq!(datos.proveedor_id, Some(3));
        assert_eq!(
            datos.lineas,
            vec![LineaCompra {
                articulo_id: 7,
                cantidad: 2.0,
                precio_unitario: 15000.0
            }]
        );
    }

    #[test]
    fn test_linea_incompleta() {
        let err = datos_compra(&campos(&[("articulo_id", "7"), ("cantidad", "2")])).unwrap_err();
        assert!(matches!(err, AppError::Validacion(e) if e[0].contains("linea 1")));
        let err = datos_consumo(&campos(&[("descripcion", "Aseo"), ("cantidad", "1")])).unwrap_err();
        assert!(matches!(err, AppError::Validacion(_)));
    }

    #[test]
    fn test_lineas_rechazan_inf_y_nan() {
        let err = datos_compra(&campos(&[
            ("numero_factura", "FV-12"),
            ("articulo_id", "7"),
            ("cantidad", "inf"),
            ("precio_unitario", "1000"),
        ]))
        .unwrap_err();
        assert!(matches!(err, AppError::Validacion(e) if e[0].contains("linea 1")));

        let err = datos_compra(&campos(&[
            ("articulo_id", "7"),
            ("cantidad", "1"),
            ("precio_unitario", "NaN"),
        ]))
        .unwrap_err();
        assert!(matches!(err, AppError::Validacion(_)));

        let err = datos_consumo(&campos(&[
            ("descripcion", "Aseo"),
            ("articulo_id", "7"),
            ("cantidad", "infinity"),
        ]))
        .unwrap_err();
        assert!(matches!(err, AppError::Validacion(_)));
    }
}
