//! Articulos de ropa y sus ventas.

use std::collections::HashMap;

use axum::extract::{Form, Path, Query, State};
use axum::response::Response;
use axum::Json;

use super::vistas::{opciones, Accion, Campo, Fila, FormularioVista, Layout, Paginacion, SeccionLineas, TablaVista};
use super::{
    filas_enviadas, id_de, o_guion, redirigir, render, render_invalido, rellenar, si_no, Campos,
    Consulta,
};
use crate::commands::{clientes, ropa, verificar_admin};
use crate::error::AppError;
use crate::models::{
    DatosArticuloRopa, FiltroVentasRopa, LineaVentaRopa, NuevaVentaRopa, SesionActiva, VentaRopa,
};
use crate::utils::formatear_moneda;
use crate::AppState;

// ============================================
// Articulos
// ============================================

pub async fn articulos(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let consulta = Consulta::new(params);
    let busqueda = consulta.opcion("busqueda");
    let pagina = ropa::listar_articulos_ropa(&state.db, busqueda.as_deref(), consulta.pagina())?;

    let mut vista = TablaVista::new(
        Layout::new(&sesion, consulta.mensaje()),
        "Articulos de ropa",
        vec!["Nombre", "Marca", "Color", "Talla", "Stock", "Precio venta", "Activo"],
    );
    vista.filtro_accion = "/ropa/articulos".to_string();
    vista.filtros = vec![Campo::texto("busqueda", "Buscar", busqueda.unwrap_or_default())];
    vista.paginacion = Some(Paginacion::new(&pagina, "/ropa/articulos", &consulta.codificada(&["busqueda"])));
    vista.filas = pagina
        .items
        .into_iter()
        .map(|a| {
            let mut acciones = vec![Accion::enlace("Editar", format!("/ropa/articulos/{}/editar", a.id))];
            if sesion.es_admin() {
                acciones.push(Accion::post(
                    "Eliminar",
                    format!("/ropa/articulos/{}/eliminar", a.id),
                    "Se eliminara el articulo",
                ));
            }
            Fila {
                celdas: vec![
                    a.nombre.clone(),
                    o_guion(a.marca.as_deref()),
                    o_guion(a.color.as_deref()),
                    o_guion(a.talla.as_deref()),
                    a.stock_actual.to_string(),
                    formatear_moneda(a.precio_venta),
                    si_no(a.activo),
                ],
                acciones,
            }
        })
        .collect();
    vista.botones = vec![
        Accion::enlace("Nuevo articulo", "/ropa/articulos/nuevo"),
        Accion::enlace("Ventas", "/ropa/ventas"),
    ];
    render(&vista)
}

fn formulario_articulo(sesion: &SesionActiva, id: Option<i64>, d: &DatosArticuloRopa) -> FormularioVista {
    let (titulo, accion) = match id {
        Some(id) => ("Editar articulo de ropa", format!("/ropa/articulos/{}/editar", id)),
        None => ("Nuevo articulo de ropa", "/ropa/articulos/nuevo".to_string()),
    };
    let texto = |v: &Option<String>| v.clone().unwrap_or_default();
    let mut vista = FormularioVista::new(Layout::new(sesion, None), titulo, accion, "/ropa/articulos");
    vista.campos = vec![
        Campo::texto("nombre", "Nombre", d.nombre.as_str()).requerido(),
        Campo::texto("descripcion", "Descripcion", texto(&d.descripcion)).con_tipo("textarea"),
        Campo::texto("marca", "Marca", texto(&d.marca)),
        Campo::texto("color", "Color", texto(&d.color)),
        Campo::texto("talla", "Talla", texto(&d.talla)),
        Campo::numero("stock_actual", "Stock", d.stock_actual.as_str(), "1").requerido(),
        Campo::numero("precio_compra", "Precio de compra", texto(&d.precio_compra), "0.01"),
        Campo::numero("precio_venta", "Precio de venta", d.precio_venta.as_str(), "0.01").requerido(),
        Campo::texto("observacion", "Observacion", texto(&d.observacion)).con_tipo("textarea"),
    ];
    if id.is_some() {
        vista.campos.push(Campo::casilla("activo", "Activo", d.activo));
    }
    vista
}

fn datos_articulo(campos: &Campos, nuevo: bool) -> DatosArticuloRopa {
    DatosArticuloRopa {
        nombre: campos.texto("nombre"),
        descripcion: campos.opcion("descripcion"),
        marca: campos.opcion("marca"),
        color: campos.opcion("color"),
        talla: campos.opcion("talla"),
        stock_actual: campos.texto("stock_actual"),
        precio_compra: campos.opcion("precio_compra"),
        precio_venta: campos.texto("precio_venta"),
        observacion: campos.opcion("observacion"),
        activo: nuevo || campos.bool("activo"),
    }
}

pub async fn nuevo_articulo(sesion: SesionActiva) -> Result<Response, AppError> {
    let datos = DatosArticuloRopa {
        stock_actual: "0".to_string(),
        activo: true,
        ..Default::default()
    };
    render(&formulario_articulo(&sesion, None, &datos))
}

pub async fn crear_articulo(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Form(pares): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let campos = Campos::new(pares);
    campos.verificar_csrf(&sesion)?;
    let datos = datos_articulo(&campos, true);
    match ropa::crear_articulo_ropa(&state.db, &datos) {
        Ok(_) => Ok(redirigir("/ropa/articulos", "creado")),
        Err(AppError::Validacion(errores)) => {
            let mut vista = formulario_articulo(&sesion, None, &datos);
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
    let a = ropa::obtener_articulo_ropa(&state.db, id)?;
    let datos = DatosArticuloRopa {
        nombre: a.nombre,
        descripcion: a.descripcion,
        marca: a.marca,
        color: a.color,
        talla: a.talla,
        stock_actual: a.stock_actual.to_string(),
        precio_compra: a.precio_compra.map(|p| p.to_string()),
        precio_venta: a.precio_venta.to_string(),
        observacion: a.observacion,
        activo: a.activo,
    };
    render(&formulario_articulo(&sesion, Some(id), &datos))
}

pub async fn actualizar_articulo(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Path(id): Path<i64>,
    Form(pares): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let campos = Campos::new(pares);
    campos.verificar_csrf(&sesion)?;
    let datos = datos_articulo(&campos, false);
    match ropa::actualizar_articulo_ropa(&state.db, id, &datos) {
        Ok(()) => Ok(redirigir("/ropa/articulos", "actualizado")),
        Err(AppError::Validacion(errores)) => {
            let mut vista = formulario_articulo(&sesion, Some(id), &datos);
            vista.errores = errores;
            render_invalido(&vista)
        }
        Err(e) => Err(e),
    }
}

pub async fn eliminar_articulo(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Path(id): Path<i64>,
    Form(pares): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    Campos::new(pares).verificar_csrf(&sesion)?;
    verificar_admin(&sesion)?;
    ropa::eliminar_articulo_ropa(&state.db, &sesion, id)?;
    Ok(redirigir("/ropa/articulos", "eliminado"))
}

// ============================================
// Ventas
// ============================================

pub async fn ventas(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let consulta = Consulta::new(params);
    let filtro = FiltroVentasRopa {
        busqueda: consulta.opcion("busqueda"),
        fecha_inicio: consulta.opcion("fecha_inicio"),
        fecha_fin: consulta.opcion("fecha_fin"),
    };
    let pagina = ropa::listar_ventas(&state.db, &filtro, consulta.pagina())?;

    let mut vista = TablaVista::new(
        Layout::new(&sesion, consulta.mensaje()),
        "Ventas de ropa",
        vec!["Fecha", "Cliente", "Articulos", "Total", "Vendido por"],
    );
    vista.filtro_accion = "/ropa/ventas".to_string();
    vista.filtros = vec![
        Campo::texto("busqueda", "Cliente o articulo", filtro.busqueda.clone().unwrap_or_default()),
        Campo::fecha("fecha_inicio", "Desde", filtro.fecha_inicio.clone().unwrap_or_default()),
        Campo::fecha("fecha_fin", "Hasta", filtro.fecha_fin.clone().unwrap_or_default()),
    ];
    vista.paginacion = Some(Paginacion::new(
        &pagina,
        "/ropa/ventas",
        &consulta.codificada(&["busqueda", "fecha_inicio", "fecha_fin"]),
    ));
    let mut total = 0.0;
    vista.filas = pagina
        .items
        .into_iter()
        .map(|v| {
            total += v.total;
            let articulos = v
                .detalles
                .iter()
                .map(|d| format!("{} x {}", d.cantidad, d.articulo))
                .collect::<Vec<_>>()
                .join(", ");
            Fila {
                celdas: vec![
                    v.created_at.clone(),
                    o_guion(v.cliente.as_deref()),
                    articulos,
                    formatear_moneda(v.total),
                    v.usuario.clone(),
                ],
                acciones: vec![
                    Accion::enlace("Detalle", format!("/ropa/ventas/{}", v.id)),
                    Accion::enlace("Editar", format!("/ropa/ventas/{}/editar", v.id)),
                    Accion::post(
                        "Eliminar",
                        format!("/ropa/ventas/{}/eliminar", v.id),
                        "Se eliminara la venta y se devolvera el stock",
                    ),
                ],
            }
        })
        .collect();
    vista.totales = vec![
        "Total de la pagina".to_string(),
        String::new(),
        String::new(),
        formatear_moneda(total),
        String::new(),
    ];
    vista.botones = vec![
        Accion::enlace("Nueva venta", "/ropa/ventas/nueva"),
        Accion::enlace("Articulos", "/ropa/articulos"),
    ];
    render(&vista)
}

fn formulario_venta(
    state: &AppState,
    sesion: &SesionActiva,
    id: Option<i64>,
    campos: Option<&Campos>,
) -> Result<FormularioVista, AppError> {
    let clientes = clientes::opciones_clientes(&state.db, "Ropa")?;
    let articulos = ropa::opciones_articulos_ropa(&state.db)?;
    let (titulo, accion) = match id {
        Some(id) => ("Editar venta", format!("/ropa/ventas/{}/editar", id)),
        None => ("Nueva venta de ropa", "/ropa/ventas/nueva".to_string()),
    };
    let mut vista = FormularioVista::new(Layout::new(sesion, None), titulo, accion, "/ropa/ventas");
    vista.campos = vec![Campo::seleccion(
        "cliente_id",
        "Cliente",
        opciones(&clientes, campos.and_then(|f| f.id("cliente_id")), Some("Sin cliente")),
    )];

    let lineas = rellenar(filas_enviadas(campos, &["articulo_ropa_id", "cantidad"]), 2);
    vista.secciones.push(SeccionLineas {
        titulo: "Articulos vendidos".to_string(),
        columnas: vec!["Articulo", "Cantidad"],
        filas: lineas
            .iter()
            .map(|l| {
                vec![
                    Campo::seleccion("articulo_ropa_id", "", opciones(&articulos, id_de(l.first()), Some("-"))),
                    Campo::numero("cantidad", "", l[1].clone(), "1"),
                ]
            })
            .collect(),
    });
    Ok(vista)
}

fn datos_venta(campos: &Campos) -> Result<NuevaVentaRopa, AppError> {
    let mut errores = Vec::new();
    let mut lineas = Vec::new();
    for (i, fila) in campos.lineas(&["articulo_ropa_id", "cantidad"]).into_iter().enumerate() {
        match (fila[0].parse::<i64>(), fila[1].parse::<i64>()) {
            (Ok(articulo_ropa_id), Ok(cantidad)) => lineas.push(LineaVentaRopa {
                articulo_ropa_id,
                cantidad,
            }),
            _ => errores.push(format!(
                "La linea {} debe tener articulo y una cantidad entera",
                i + 1
            )),
        }
    }
    if !errores.is_empty() {
        return Err(AppError::Validacion(errores));
    }
    Ok(NuevaVentaRopa {
        cliente_id: campos.id("cliente_id"),
        lineas,
    })
}

fn campos_venta(v: &VentaRopa) -> Campos {
    let mut pares = Vec::new();
    if let Some(cliente_id) = v.cliente_id {
        pares.push(("cliente_id".to_string(), cliente_id.to_string()));
    }
    for d in &v.detalles {
        pares.push(("articulo_ropa_id".to_string(), d.articulo_ropa_id.to_string()));
        pares.push(("cantidad".to_string(), d.cantidad.to_string()));
    }
    Campos::new(pares)
}

pub async fn nueva_venta(
    State(state): State<AppState>,
    sesion: SesionActiva,
) -> Result<Response, AppError> {
    render(&formulario_venta(&state, &sesion, None, None)?)
}

pub async fn crear_venta(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Form(pares): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let campos = Campos::new(pares);
    campos.verificar_csrf(&sesion)?;
    match datos_venta(&campos).and_then(|d| ropa::crear_venta(&state.db, &sesion, &d)) {
        Ok(_) => Ok(redirigir("/ropa/ventas", "creado")),
        Err(AppError::Validacion(errores)) => {
            let mut vista = formulario_venta(&state, &sesion, None, Some(&campos))?;
            vista.errores = errores;
            render_invalido(&vista)
        }
        Err(e) => Err(e),
    }
}

pub async fn ver_venta(
    State(state): State<AppState>,
    _sesion: SesionActiva,
    Path(id): Path<i64>,
) -> Result<Json<VentaRopa>, AppError> {
    Ok(Json(ropa::obtener_venta(&state.db, id)?))
}

pub async fn editar_venta(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let venta = ropa::obtener_venta(&state.db, id)?;
    render(&formulario_venta(&state, &sesion, Some(id), Some(&campos_venta(&venta)))?)
}

pub async fn actualizar_venta(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Path(id): Path<i64>,
    Form(pares): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let campos = Campos::new(pares);
    campos.verificar_csrf(&sesion)?;
    match datos_venta(&campos).and_then(|d| ropa::editar_venta(&state.db, &sesion, id, &d)) {
        Ok(()) => Ok(redirigir("/ropa/ventas", "actualizado")),
        Err(AppError::Validacion(errores)) => {
            let mut vista = formulario_venta(&state, &sesion, Some(id), Some(&campos))?;
            vista.errores = errores;
            render_invalido(&vista)
        }
        Err(e) => Err(e),
    }
}

pub async fn eliminar_venta(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Path(id): Path<i64>,
    Form(pares): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    Campos::new(pares).verificar_csrf(&sesion)?;
    ropa::eliminar_venta(&state.db, &sesion, id)?;
    Ok(redirigir("/ropa/ventas", "eliminado"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cantidad_entera_en_ventas() {
        let campos = Campos::new(vec![
            ("cliente_id".to_string(), "".to_string()),
            ("articulo_ropa_id".to_string(), "5".to_string()),
            ("cantidad".to_string(), "1.5".to_string()),
        ]);
        assert!(matches!(datos_venta(&campos), Err(AppError::Validacion(_))));

        let campos = Campos::new(vec![
            ("articulo_ropa_id".to_string(), "5".to_string()),
            ("cantidad".to_string(), "2".to_string()),
        ]);
        let venta = datos_venta(&campos).unwrap();
        assert_eq!(venta.cliente_id, None);
        assert_eq!(
            venta.lineas,
            vec![LineaVentaRopa {
                articulo_ropa_id: 5,
                cantidad: 2
            }]
        );
    }
}
