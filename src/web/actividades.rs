use std::collections::HashMap;

use axum::extract::{Form, Path, Query, State};
use axum::response::Response;

use super::vistas::{
    opciones, Accion, ActividadVista, Campo, FichaVista, FichasVista, Fila, FormularioVista, Layout,
    Paginacion, SeccionLineas, TablaVista,
};
use super::{
    descarga, filas_enviadas, id_de, redirigir, render, render_invalido, rellenar, Campos, Consulta,
};
use crate::commands::{
    actividades, bancos, clientes, exportar, inventario, personal, precios, procedimientos,
};
use crate::error::AppError;
use crate::models::{
    Actividad, FiltroActividades, ItemCatalogo, LineaInsumo, NuevaActividad, NuevoPago, SesionActiva,
};
use crate::utils::{formatear_cantidad, formatear_moneda, parse_numero};
use crate::AppState;

const FILTROS_FICHAS: [&str; 6] = [
    "buscar",
    "personal_id",
    "cliente_id",
    "procedimiento_id",
    "fecha_inicio",
    "fecha_fin",
];

fn filtro(consulta: &Consulta) -> FiltroActividades {
    FiltroActividades {
        buscar: consulta.opcion("buscar"),
        personal_id: consulta.id("personal_id"),
        cliente_id: consulta.id("cliente_id"),
        procedimiento_id: consulta.id("procedimiento_id"),
        fecha_inicio: consulta.opcion("fecha_inicio"),
        fecha_fin: consulta.opcion("fecha_fin"),
    }
}

fn actividad_vista(a: Actividad) -> ActividadVista {
    let pagos = a
        .pagos
        .iter()
        .map(|p| {
            let mut texto = format!("{} {}", p.forma_pago, formatear_moneda(p.monto));
            if let Some(banco) = &p.banco {
                texto.push_str(&format!(" ({})", banco));
            }
            texto
        })
        .collect::<Vec<_>>()
        .join(", ");
    let precio = if a.es_vale() {
        formatear_moneda(a.vales)
    } else {
        a.precio.map(formatear_moneda).unwrap_or_default()
    };
    ActividadVista {
        hora: a.created_at.get(11..16).unwrap_or_default().to_string(),
        cliente: a.cliente.clone().unwrap_or_default(),
        procedimiento: a.procedimiento.clone().unwrap_or_default(),
        descripcion: a.descripcion.clone().unwrap_or_default(),
        anulada: a.anulada(),
        tiene_factura: a.tiene_factura,
        estado: a.estado,
        id: a.id,
        precio,
        pagos,
    }
}

pub async fn fichas(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let consulta = Consulta::new(params);
    let filtro = filtro(&consulta);
    let pagina = actividades::listar_fichas(&state.db, &filtro, consulta.pagina())?;

    let filtros = vec![
        Campo::texto("buscar", "Buscar", filtro.buscar.clone().unwrap_or_default()),
        Campo::seleccion(
            "personal_id",
            "Personal",
            opciones(&personal::opciones_personal(&state.db)?, filtro.personal_id, Some("Todos")),
        ),
        Campo::seleccion(
            "cliente_id",
            "Cliente",
            opciones(&clientes::opciones_clientes(&state.db, "Spa")?, filtro.cliente_id, Some("Todos")),
        ),
        Campo::seleccion(
            "procedimiento_id",
            "Procedimiento",
            opciones(
                &procedimientos::opciones_procedimientos(&state.db)?,
                filtro.procedimiento_id,
                Some("Todos"),
            ),
        ),
        Campo::fecha("fecha_inicio", "Desde", filtro.fecha_inicio.clone().unwrap_or_default()),
        Campo::fecha("fecha_fin", "Hasta", filtro.fecha_fin.clone().unwrap_or_default()),
    ];
    let paginacion = Paginacion::new(&pagina, "/mis-actividades", &consulta.codificada(&FILTROS_FICHAS));
    let fichas = pagina
        .items
        .into_iter()
        .map(|f| FichaVista {
            fecha: f.fecha,
            personal: f.personal,
            total_actividades: formatear_moneda(f.total_actividades),
            total_vales: formatear_moneda(f.total_vales),
            actividades: f.actividades.into_iter().map(actividad_vista).collect(),
            vales: f.vales.into_iter().map(actividad_vista).collect(),
        })
        .collect();

    render(&FichasVista {
        layout: Layout::new(&sesion, consulta.mensaje()),
        filtros,
        fichas,
        paginacion,
    })
}

struct Catalogos {
    personal: Vec<ItemCatalogo>,
    clientes: Vec<ItemCatalogo>,
    procedimientos: Vec<ItemCatalogo>,
    precios: Vec<ItemCatalogo>,
    formas_pago: Vec<ItemCatalogo>,
    bancos: Vec<ItemCatalogo>,
    articulos: Vec<ItemCatalogo>,
}

impl Catalogos {
    fn cargar(state: &AppState) -> Result<Self, AppError> {
        Ok(Self {
            personal: personal::opciones_personal(&state.db)?,
            clientes: clientes::opciones_clientes(&state.db, "Spa")?,
            procedimientos: procedimientos::opciones_procedimientos(&state.db)?,
            precios: precios::listar_precios(&state.db)?
                .into_iter()
                .map(|p| ItemCatalogo {
                    id: p.id,
                    nombre: formatear_moneda(p.monto),
                })
                .collect(),
            formas_pago: actividades::opciones_formas_pago(&state.db)?,
            bancos: bancos::listar_bancos(&state.db, true)?
                .into_iter()
                .map(|b| ItemCatalogo {
                    id: b.id,
                    nombre: b.nombre,
                })
                .collect(),
            articulos: inventario::opciones_articulos(&state.db)?,
        })
    }
}

fn formulario_actividad(
    state: &AppState,
    sesion: &SesionActiva,
    campos: Option<&Campos>,
) -> Result<FormularioVista, AppError> {
    let c = Catalogos::cargar(state)?;
    let valor = |clave: &str| campos.map(|f| f.texto(clave)).unwrap_or_default();
    let id = |clave: &str| campos.and_then(|f| f.id(clave));
    let filas = |claves: &[&str]| filas_enviadas(campos, claves);

    let mut vista = FormularioVista::new(
        Layout::new(sesion, None),
        "Registrar actividad",
        "/actividades/nueva",
        "/mis-actividades",
    );
    vista.campos = vec![
        Campo::seleccion("personal_id", "Personal", opciones(&c.personal, id("personal_id"), Some("Seleccione...")))
            .requerido(),
        Campo::seleccion("cliente_id", "Cliente", opciones(&c.clientes, id("cliente_id"), Some("Seleccione..."))),
        Campo::seleccion(
            "procedimiento_id",
            "Procedimiento",
            opciones(&c.procedimientos, id("procedimiento_id"), Some("Seleccione...")),
        ),
        Campo::seleccion(
            "precio_id",
            "Precio (vacio = el del procedimiento)",
            opciones(&c.precios, id("precio_id"), Some("-")),
        ),
        Campo::numero("vales", "Vale (solo para adelantos al personal)", valor("vales"), "0.01"),
        Campo::texto("descripcion", "Descripcion", valor("descripcion")).con_tipo("textarea"),
    ];

    let pagos = rellenar(filas(&["forma_pago_id", "banco_id", "monto", "referencia_pago"]), 4);
    vista.secciones.push(SeccionLineas {
        titulo: "Pagos".to_string(),
        columnas: vec!["Forma de pago", "Banco", "Monto", "Referencia"],
        filas: pagos
            .iter()
            .map(|p| {
                vec![
                    Campo::seleccion("forma_pago_id", "", opciones(&c.formas_pago, id_de(p.first()), Some("-"))),
                    Campo::seleccion("banco_id", "", opciones(&c.bancos, id_de(p.get(1)), Some("-"))),
                    Campo::numero("monto", "", p[2].clone(), "0.01"),
                    Campo::texto("referencia_pago", "", p[3].clone()),
                ]
            })
            .collect(),
    });

    let insumos = rellenar(filas(&["articulo_id", "cantidad"]), 2);
    vista.secciones.push(SeccionLineas {
        titulo: "Insumos utilizados".to_string(),
        columnas: vec!["Articulo", "Cantidad"],
        filas: insumos
            .iter()
            .map(|i| {
                vec![
                    Campo::seleccion("articulo_id", "", opciones(&c.articulos, id_de(i.first()), Some("-"))),
                    Campo::numero("cantidad", "", i[1].clone(), "0.001"),
                ]
            })
            .collect(),
    });
    Ok(vista)
}

/// Convierte el formulario; los numeros mal escritos son errores de validacion
fn datos_actividad(campos: &Campos) -> Result<NuevaActividad, AppError> {
    let mut errores = Vec::new();
    let vales = match campos.opcion("vales") {
        Some(v) => parse_numero(&v).unwrap_or_else(|| {
            errores.push("El Vale debe ser numerico".to_string());
            0.0
        }),
        None => 0.0,
    };

    let mut pagos = Vec::new();
    for (i, fila) in campos
        .lineas(&["forma_pago_id", "banco_id", "monto", "referencia_pago"])
        .into_iter()
        .enumerate()
    {
        let (Ok(forma_pago_id), Some(monto)) = (fila[0].parse::<i64>(), parse_numero(fila[2])) else {
            errores.push(format!("El pago {} debe tener forma de pago y monto", i + 1));
            continue;
        };
        pagos.push(NuevoPago {
            forma_pago_id,
            banco_id: fila[1].parse().ok(),
            monto,
            referencia_pago: crate::utils::limpiar(Some(fila[3])),
        });
    }

    let mut insumos = Vec::new();
    for (i, fila) in campos.lineas(&["articulo_id", "cantidad"]).into_iter().enumerate() {
        let (Ok(articulo_id), Some(cantidad)) = (fila[0].parse::<i64>(), parse_numero(fila[1])) else {
            errores.push(format!("El insumo {} debe tener articulo y cantidad", i + 1));
            continue;
        };
        insumos.push(LineaInsumo { articulo_id, cantidad });
    }

    if !errores.is_empty() {
        return Err(AppError::Validacion(errores));
    }
    Ok(NuevaActividad {
        personal_id: campos.id("personal_id"),
        cliente_id: campos.id("cliente_id"),
        procedimiento_id: campos.id("procedimiento_id"),
        precio_id: campos.id("precio_id"),
        vales,
        descripcion: campos.opcion("descripcion"),
        pagos,
        insumos,
    })
}

pub async fn nueva(
    State(state): State<AppState>,
    sesion: SesionActiva,
) -> Result<Response, AppError> {
    render(&formulario_actividad(&state, &sesion, None)?)
}

pub async fn crear(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Form(pares): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let campos = Campos::new(pares);
    campos.verificar_csrf(&sesion)?;
    let resultado = datos_actividad(&campos)
        .and_then(|datos| actividades::crear_actividad(&state.db, &sesion, &datos));
    match resultado {
        Ok(_) => Ok(redirigir("/mis-actividades", "creado")),
        Err(AppError::Validacion(errores)) => {
            let mut vista = formulario_actividad(&state, &sesion, Some(&campos))?;
            vista.errores = errores;
            render_invalido(&vista)
        }
        Err(e) => Err(e),
    }
}

pub async fn anular(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Path(id): Path<String>,
    Form(pares): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    Campos::new(pares).verificar_csrf(&sesion)?;
    actividades::anular_actividad(&state.db, &sesion, &id)?;
    Ok(redirigir("/mis-actividades", "anulado"))
}

pub async fn eliminar_vale(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Path(id): Path<String>,
    Form(pares): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    Campos::new(pares).verificar_csrf(&sesion)?;
    actividades::eliminar_vale(&state.db, &sesion, &id)?;
    Ok(redirigir("/mis-actividades", "eliminado"))
}

// ============================================
// Pagos diarios del personal
// ============================================

const FILTROS_PAGOS: [&str; 3] = ["personal_id", "fecha_inicio", "fecha_fin"];

fn filtro_pagos(state: &AppState, consulta: &Consulta) -> FiltroActividades {
    let hoy = state.db.hoy().format("%Y-%m-%d").to_string();
    FiltroActividades {
        personal_id: consulta.id("personal_id"),
        fecha_inicio: Some(consulta.opcion("fecha_inicio").unwrap_or_else(|| hoy.clone())),
        fecha_fin: Some(consulta.opcion("fecha_fin").unwrap_or(hoy)),
        ..Default::default()
    }
}

pub async fn pagos(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let consulta = Consulta::new(params);
    let filtro = filtro_pagos(&state, &consulta);
    let (pagina, totales) = actividades::pagos_personal(&state.db, &filtro, consulta.pagina())?;
    let filtros_url = consulta.codificada(&FILTROS_PAGOS);

    let mut vista = TablaVista::new(
        Layout::new(&sesion, consulta.mensaje()),
        "Pagos diarios del personal",
        vec!["Personal", "% Comision", "Servicios", "Facturado", "Ganancia", "Vales", "Neto"],
    );
    vista.filtro_accion = "/actividades/pagos".to_string();
    vista.filtros = vec![
        Campo::seleccion(
            "personal_id",
            "Personal",
            opciones(&personal::opciones_personal(&state.db)?, filtro.personal_id, Some("Todos")),
        ),
        Campo::fecha("fecha_inicio", "Desde", filtro.fecha_inicio.clone().unwrap_or_default()),
        Campo::fecha("fecha_fin", "Hasta", filtro.fecha_fin.clone().unwrap_or_default()),
    ];
    vista.paginacion = Some(Paginacion::new(&pagina, "/actividades/pagos", &filtros_url));
    vista.filas = pagina
        .items
        .into_iter()
        .map(|p| Fila {
            celdas: vec![
                p.personal,
                format!("{}%", formatear_cantidad(p.porcentaje)),
                p.servicios.to_string(),
                formatear_moneda(p.total_facturado),
                formatear_moneda(p.ganancia),
                formatear_moneda(p.vales),
                formatear_moneda(p.neto),
            ],
            acciones: Vec::new(),
        })
        .collect();
    vista.totales = vec![
        "TOTALES".to_string(),
        String::new(),
        String::new(),
        formatear_moneda(totales.total_facturado),
        formatear_moneda(totales.ganancia),
        formatear_moneda(totales.vales),
        formatear_moneda(totales.neto),
    ];
    let url_exportar = if filtros_url.is_empty() {
        "/actividades/pagos/exportar".to_string()
    } else {
        format!("/actividades/pagos/exportar?{}", filtros_url)
    };
    vista.botones = vec![Accion::enlace("Exportar a Excel", url_exportar)];
    render(&vista)
}

pub async fn exportar_pagos(
    State(state): State<AppState>,
    _sesion: SesionActiva,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let consulta = Consulta::new(params);
    let filtro = filtro_pagos(&state, &consulta);
    let bytes = exportar::pagos_diarios_csv(&state.db, &filtro)?;
    let archivo = format!(
        "pagos-{}-{}.csv",
        filtro.fecha_inicio.unwrap_or_default(),
        filtro.fecha_fin.unwrap_or_default()
    );
    Ok(descarga(bytes, "text/csv; charset=utf-8", &archivo, true))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn campos(pares: &[(&str, &str)]) -> Campos {
        Campos::new(
            pares
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_vale_y_montos_rechazan_inf_y_nan() {
        let err = datos_actividad(&campos(&[("personal_id", "1"), ("vales", "inf")])).unwrap_err();
        assert!(matches!(err, AppError::Validacion(e) if e[0].contains("Vale")));

        let err = datos_actividad(&campos(&[
            ("personal_id", "1"),
            ("forma_pago_id", "1"),
            ("banco_id", ""),
            ("monto", "NaN"),
            ("referencia_pago", ""),
        ]))
        .unwrap_err();
        assert!(matches!(err, AppError::Validacion(e) if e[0].contains("pago 1")));

        let err = datos_actividad(&campos(&[
            ("personal_id", "1"),
            ("articulo_id", "4"),
            ("cantidad", "-inf"),
        ]))
        .unwrap_err();
        assert!(matches!(err, AppError::Validacion(e) if e[0].contains("insumo 1")));
    }

    #[test]
    fn test_vale_valido() {
        let datos = datos_actividad(&campos(&[("personal_id", "1"), ("vales", "5000")])).unwrap();
        assert_eq!(datos.vales, 5000.0);
        assert!(datos.pagos.is_empty());
    }
}
