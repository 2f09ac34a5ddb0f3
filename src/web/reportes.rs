use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::response::Response;

use super::vistas::{Accion, Bloque, Campo, Fila, Layout, Linea, Paginacion, ResumenVista, TablaVista};
use super::{render, Consulta};
use crate::commands::reportes::{self, InicioPorDefecto};
use crate::error::AppError;
use crate::models::SesionActiva;
use crate::utils::formatear_moneda;
use crate::AppState;

fn filtros_fecha(inicio: &str, fin: &str) -> Vec<Campo> {
    vec![
        Campo::fecha("fecha_inicio", "Desde", inicio),
        Campo::fecha("fecha_fin", "Hasta", fin),
    ]
}

fn rango(state: &AppState, consulta: &Consulta, por_defecto: InicioPorDefecto) -> (String, String) {
    reportes::rango(
        &state.db,
        consulta.opcion("fecha_inicio").as_deref(),
        consulta.opcion("fecha_fin").as_deref(),
        por_defecto,
    )
}

fn botones_reportes() -> Vec<Accion> {
    vec![
        Accion::enlace("Ganancias y perdidas", "/reportes/ganancias"),
        Accion::enlace("Personal", "/reportes/personal"),
        Accion::enlace("Clientes frecuentes", "/reportes/clientes-frecuentes"),
    ]
}

pub async fn ganancias(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let consulta = Consulta::new(params);
    let (inicio, fin) = rango(&state, &consulta, InicioPorDefecto::InicioDeMes);
    let r = reportes::ganancias_perdidas(&state.db, &sesion, &inicio, &fin)?;
    let resultado = if r.utilidad >= 0.0 { "Utilidad" } else { "Perdida" };

    render(&ResumenVista {
        layout: Layout::new(&sesion, consulta.mensaje()),
        titulo: format!("Ganancias y perdidas del {} al {}", r.fecha_inicio, r.fecha_fin),
        filtro_accion: "/reportes/ganancias".to_string(),
        filtros: filtros_fecha(&inicio, &fin),
        bloques: vec![
            Bloque {
                titulo: "Ingresos".to_string(),
                lineas: vec![Linea::new("Servicios realizados", formatear_moneda(r.ingresos))],
            },
            Bloque {
                titulo: "Gastos".to_string(),
                lineas: vec![
                    Linea::new("Compras a proveedores", formatear_moneda(r.gastos_compras)),
                    Linea::new("Consumo interno", formatear_moneda(r.gastos_consumo)),
                    Linea::new("Total gastos", formatear_moneda(r.total_gastos)),
                ],
            },
            Bloque {
                titulo: "Resultado".to_string(),
                lineas: vec![Linea::new(resultado, formatear_moneda(r.utilidad))],
            },
        ],
        botones: botones_reportes(),
    })
}

pub async fn personal(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let consulta = Consulta::new(params);
    let (inicio, fin) = rango(&state, &consulta, InicioPorDefecto::InicioDeMes);
    let pagina = reportes::reporte_personal(&state.db, &sesion, &inicio, &fin, consulta.pagina())?;
    let filtros_url = serde_urlencoded::to_string([("fecha_inicio", &inicio), ("fecha_fin", &fin)])
        .unwrap_or_default();

    let mut vista = TablaVista::new(
        Layout::new(&sesion, consulta.mensaje()),
        "Reporte de personal",
        vec!["Personal", "Servicios", "Facturado", "Comision %", "Ganancia", "Vales", "Neto"],
    );
    vista.filtro_accion = "/reportes/personal".to_string();
    vista.filtros = filtros_fecha(&inicio, &fin);
    vista.paginacion = Some(Paginacion::new(&pagina, "/reportes/personal", &filtros_url));
    vista.filas = pagina
        .items
        .into_iter()
        .map(|p| Fila {
            celdas: vec![
                p.personal.clone(),
                p.servicios.to_string(),
                formatear_moneda(p.total_facturado),
                format!("{}%", p.porcentaje),
                formatear_moneda(p.ganancia),
                formatear_moneda(p.vales),
                formatear_moneda(p.neto),
            ],
            acciones: Vec::new(),
        })
        .collect();
    vista.botones = botones_reportes();
    render(&vista)
}

pub async fn clientes_frecuentes(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let consulta = Consulta::new(params);
    let (inicio, fin) = rango(&state, &consulta, InicioPorDefecto::MesAnterior);
    let clientes = reportes::clientes_frecuentes(&state.db, &sesion, &inicio, &fin)?;

    let mut vista = TablaVista::new(
        Layout::new(&sesion, consulta.mensaje()),
        "Clientes frecuentes",
        vec!["#", "Cliente", "Visitas", "Total facturado"],
    );
    vista.filtro_accion = "/reportes/clientes-frecuentes".to_string();
    vista.filtros = filtros_fecha(&inicio, &fin);
    vista.filas = clientes
        .into_iter()
        .enumerate()
        .map(|(i, c)| Fila {
            celdas: vec![
                (i + 1).to_string(),
                c.cliente.clone(),
                c.visitas.to_string(),
                formatear_moneda(c.total_facturado),
            ],
            acciones: Vec::new(),
        })
        .collect();
    vista.botones = botones_reportes();
    render(&vista)
}
