use std::collections::HashMap;

use axum::extract::{Form, Path, Query, State};
use axum::response::Response;
use axum::Json;

use super::vistas::{Accion, Bloque, Campo, Fila, FormularioVista, Layout, Linea, ResumenVista, TablaVista};
use super::{o_guion, redirigir, render, render_invalido, Campos, Consulta};
use crate::commands::caja::{self, EstadoCierre};
use crate::error::AppError;
use crate::models::{CierreCaja, NuevoCierre, SesionActiva, TotalesDia, CIERRE_CONSOLIDADO, DENOMINACIONES};
use crate::utils::{formatear_moneda, parse_numero};
use crate::AppState;

fn lineas_totales(t: &TotalesDia) -> Vec<Linea> {
    vec![
        Linea::new("Fecha", t.fecha.clone()),
        Linea::new("Servicios realizados", t.num_actividades.to_string()),
        Linea::new("Efectivo", formatear_moneda(t.total_efectivo)),
        Linea::new("Datafono", formatear_moneda(t.total_datafono)),
        Linea::new("Transferencia", formatear_moneda(t.total_transferencia)),
        Linea::new("Total ventas del dia", formatear_moneda(t.total_ventas_dia)),
        Linea::new(&format!("Vales ({})", t.num_vales), formatear_moneda(t.total_vales)),
        Linea::new("Efectivo esperado en caja", formatear_moneda(t.total_efectivo_sistema)),
    ]
}

fn campo_denominacion(denominacion: i64) -> String {
    format!("den_{}", denominacion)
}

fn formulario_cierre(
    sesion: &SesionActiva,
    totales: &TotalesDia,
    campos: Option<&Campos>,
) -> FormularioVista {
    let valor = |clave: &str| campos.map(|f| f.texto(clave)).unwrap_or_default();
    let mut vista = FormularioVista::new(
        Layout::new(sesion, None),
        &format!("Cierre de caja del {}", totales.fecha),
        "/caja/cierre",
        "/caja/historial",
    );
    vista.resumen = lineas_totales(totales);
    vista.campos = vec![
        Campo::oculto("fecha", totales.fecha.as_str()),
        Campo::numero("total_efectivo_contado", "Efectivo contado", valor("total_efectivo_contado"), "0.01"),
    ];
    for denominacion in DENOMINACIONES {
        let nombre = campo_denominacion(denominacion);
        let etiqueta = format!("Cantidad de {}", formatear_moneda(denominacion as f64));
        vista.campos.push(Campo::numero(&nombre, &etiqueta, valor(&nombre), "1"));
    }
    vista.campos.push(
        Campo::texto("observaciones", "Observaciones", valor("observaciones")).con_tipo("textarea"),
    );
    vista
}

fn vista_cierre(sesion: &SesionActiva, cierre: &CierreCaja, mensaje: Option<String>) -> ResumenVista {
    let mut conteo = Vec::new();
    if let Some(serde_json::Value::Object(mapa)) = &cierre.desglose_efectivo {
        for denominacion in DENOMINACIONES {
            if let Some(cantidad) = mapa.get(&denominacion.to_string()).and_then(|v| v.as_i64()) {
                conteo.push(Linea::new(
                    &formatear_moneda(denominacion as f64),
                    format!("{} = {}", cantidad, formatear_moneda((denominacion * cantidad) as f64)),
                ));
            }
        }
    }

    let mut bloques = vec![
        Bloque {
            titulo: "Totales".to_string(),
            lineas: vec![
                Linea::new("Efectivo", formatear_moneda(cierre.total_efectivo)),
                Linea::new("Datafono", formatear_moneda(cierre.total_datafono)),
                Linea::new("Transferencia", formatear_moneda(cierre.total_transferencia)),
                Linea::new("Total ventas del dia", formatear_moneda(cierre.total_ventas_dia)),
                Linea::new("Vales", formatear_moneda(cierre.total_vales)),
            ],
        },
        Bloque {
            titulo: "Arqueo".to_string(),
            lineas: vec![
                Linea::new("Efectivo esperado", formatear_moneda(cierre.total_efectivo_sistema)),
                Linea::new("Efectivo contado", formatear_moneda(cierre.total_efectivo_contado)),
                Linea::new("Descuadre", formatear_moneda(cierre.descuadre)),
                Linea::new("Observaciones", o_guion(cierre.observaciones.as_deref())),
                Linea::new("Cerrado por", cierre.usuario.clone()),
                Linea::new("Registrado", cierre.created_at.clone()),
            ],
        },
    ];
    if !conteo.is_empty() {
        bloques.push(Bloque {
            titulo: "Desglose del efectivo".to_string(),
            lineas: conteo,
        });
    }

    let mut botones = vec![Accion::enlace("Historial", "/caja/historial")];
    if sesion.es_admin() && cierre.estado == CIERRE_CONSOLIDADO {
        botones.push(Accion::post(
            "Anular cierre",
            format!("/caja/cierres/{}/anular", cierre.id),
            "Se anulara el cierre y el dia quedara abierto de nuevo",
        ));
    }

    ResumenVista {
        layout: Layout::new(sesion, mensaje),
        titulo: format!("Cierre de caja del {} ({})", cierre.fecha, cierre.estado),
        filtro_accion: "/caja/cierre".to_string(),
        filtros: vec![Campo::fecha("fecha", "Fecha", cierre.fecha.as_str())],
        bloques,
        botones,
    }
}

pub async fn cierre(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let consulta = Consulta::new(params);
    match caja::mostrar_cierre(&state.db, consulta.opcion("fecha").as_deref())? {
        EstadoCierre::Consolidado(cierre) => render(&vista_cierre(&sesion, &cierre, consulta.mensaje())),
        EstadoCierre::Pendiente(totales) => {
            let mut vista = formulario_cierre(&sesion, &totales, None);
            vista.layout.mensaje = consulta.mensaje();
            render(&vista)
        }
        EstadoCierre::SinMovimientos(_) => Ok(redirigir("/mis-actividades", "sin_movimientos")),
    }
}

/// Conteo por denominacion; None cuando no se desgloso nada
fn desglose(campos: &Campos, errores: &mut Vec<String>) -> Option<Vec<(i64, i64)>> {
    let mut conteo = Vec::new();
    for denominacion in DENOMINACIONES {
        let Some(texto) = campos.opcion(&campo_denominacion(denominacion)) else {
            continue;
        };
        match texto.parse::<i64>() {
            Ok(0) => {}
            Ok(cantidad) => conteo.push((denominacion, cantidad)),
            Err(_) => errores.push(format!(
                "La cantidad de {} no es valida",
                formatear_moneda(denominacion as f64)
            )),
        }
    }
    if conteo.is_empty() {
        None
    } else {
        Some(conteo)
    }
}

fn datos_cierre(campos: &Campos) -> Result<NuevoCierre, AppError> {
    let mut errores = Vec::new();
    let desglose = desglose(campos, &mut errores);
    let contado = match (campos.opcion("total_efectivo_contado"), &desglose) {
        (Some(texto), _) => parse_numero(&texto).unwrap_or_else(|| {
            errores.push("El Efectivo contado debe ser numerico".to_string());
            0.0
        }),
        (None, Some(conteo)) => match caja::valor_desglose(conteo) {
            Some(total) => total as f64,
            None => {
                errores.push("El desglose excede el valor permitido".to_string());
                0.0
            }
        },
        (None, None) => {
            errores.push("El Efectivo contado es obligatorio".to_string());
            0.0
        }
    };
    if !errores.is_empty() {
        return Err(AppError::Validacion(errores));
    }
    Ok(NuevoCierre {
        fecha: campos.texto("fecha"),
        total_efectivo_contado: contado,
        desglose,
        observaciones: campos.opcion("observaciones"),
    })
}

pub async fn guardar(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Form(pares): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let campos = Campos::new(pares);
    campos.verificar_csrf(&sesion)?;
    let resultado = datos_cierre(&campos).and_then(|datos| caja::guardar_cierre(&state.db, &sesion, &datos));
    match resultado {
        Ok(_) => Ok(redirigir("/caja/historial", "cierre")),
        Err(AppError::Validacion(errores)) => {
            match caja::mostrar_cierre(&state.db, campos.opcion("fecha").as_deref())? {
                EstadoCierre::Pendiente(totales) => {
                    let mut vista = formulario_cierre(&sesion, &totales, Some(&campos));
                    vista.errores = errores;
                    render_invalido(&vista)
                }
                EstadoCierre::Consolidado(cierre) => render(&vista_cierre(&sesion, &cierre, None)),
                EstadoCierre::SinMovimientos(_) => Err(AppError::Validacion(errores)),
            }
        }
        Err(e) => Err(e),
    }
}

pub async fn historial(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let cierres = caja::historial_cierres(&state.db)?;
    let mut vista = TablaVista::new(
        Layout::new(&sesion, Consulta::new(params).mensaje()),
        "Historial de cierres",
        vec!["Fecha", "Ventas", "Vales", "Esperado", "Contado", "Descuadre", "Estado", "Usuario"],
    );
    vista.filtro_accion = "/caja/cierre".to_string();
    vista.filtros = vec![Campo::fecha("fecha", "Ir al cierre del", "")];
    vista.filas = cierres
        .into_iter()
        .map(|c| {
            let consolidado = c.estado == CIERRE_CONSOLIDADO;
            let mut acciones = vec![if consolidado {
                Accion::enlace("Ver", format!("/caja/cierre?fecha={}", c.fecha))
            } else {
                Accion::enlace("Ver", format!("/caja/cierres/{}", c.id))
            }];
            if sesion.es_admin() && consolidado {
                acciones.push(Accion::post(
                    "Anular",
                    format!("/caja/cierres/{}/anular", c.id),
                    "Se anulara el cierre y el dia quedara abierto de nuevo",
                ));
            }
            Fila {
                celdas: vec![
                    c.fecha.clone(),
                    formatear_moneda(c.total_ventas_dia),
                    formatear_moneda(c.total_vales),
                    formatear_moneda(c.total_efectivo_sistema),
                    formatear_moneda(c.total_efectivo_contado),
                    formatear_moneda(c.descuadre),
                    c.estado.clone(),
                    c.usuario.clone(),
                ],
                acciones,
            }
        })
        .collect();
    vista.botones = vec![Accion::enlace("Cierre de hoy", "/caja/cierre")];
    render(&vista)
}

pub async fn ver(
    State(state): State<AppState>,
    _sesion: SesionActiva,
    Path(id): Path<i64>,
) -> Result<Json<CierreCaja>, AppError> {
    Ok(Json(caja::obtener_cierre(&state.db, id)?))
}

pub async fn anular(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Path(id): Path<i64>,
    Form(pares): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    Campos::new(pares).verificar_csrf(&sesion)?;
    caja::anular_cierre(&state.db, &sesion, id)?;
    Ok(redirigir("/caja/historial", "anulado"))
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
    fn test_contado_desde_desglose() {
        let datos = datos_cierre(&campos(&[
            ("fecha", "2026-03-02"),
            ("den_50000", "1"),
            ("den_1000", "3"),
            ("den_500", "0"),
        ]))
        .unwrap();
        assert_eq!(datos.total_efectivo_contado, 53000.0);
        assert_eq!(datos.desglose, Some(vec![(50000, 1), (1000, 3)]));
    }

    #[test]
    fn test_contado_obligatorio() {
        let err = datos_cierre(&campos(&[("fecha", "2026-03-02")])).unwrap_err();
        assert!(matches!(err, AppError::Validacion(e) if e.len() == 1));
        let err = datos_cierre(&campos(&[("total_efectivo_contado", "mucho")])).unwrap_err();
        assert!(matches!(err, AppError::Validacion(_)));
    }

    #[test]
    fn test_contado_rechaza_inf_y_nan() {
        for texto in ["inf", "-infinity", "NaN"] {
            let err = datos_cierre(&campos(&[("fecha", "2026-03-02"), ("total_efectivo_contado", texto)]))
                .unwrap_err();
            assert!(matches!(err, AppError::Validacion(_)), "{texto}");
        }
    }

    #[test]
    fn test_desglose_gigante_no_desborda() {
        let err = datos_cierre(&campos(&[
            ("fecha", "2026-03-02"),
            ("den_100000", "1000000000000000"),
            ("den_50000", "9223372036854775807"),
        ]))
        .unwrap_err();
        assert!(matches!(err, AppError::Validacion(e) if e[0].contains("excede")));
    }
}
