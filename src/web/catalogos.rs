use std::collections::HashMap;

use axum::extract::{Form, Path, Query, State};
use axum::response::Response;

use super::vistas::{
    opciones, opciones_texto, Accion, Campo, Fila, FormularioVista, Layout, Paginacion, TablaVista,
};
use super::{o_guion, redirigir, render, render_invalido, si_no, Campos, Consulta};
use crate::commands::{clientes, personal, precios, procedimientos, proveedores};
use crate::error::AppError;
use crate::models::{
    DatosCliente, DatosPersonal, DatosProcedimiento, DatosProveedor, ItemCatalogo, SesionActiva,
    TIPOS_CLIENTE, TIPOS_DOCUMENTO,
};
use crate::utils::{formatear_moneda, prefijos_celular};
use crate::AppState;

/// Los telefonos se guardan como prefijo + 7 digitos
fn partir_telefono(telefono: &str) -> (String, String) {
    match (telefono.get(..3), telefono.get(3..)) {
        (Some(prefijo), Some(numero)) => (prefijo.to_string(), numero.to_string()),
        _ => (String::new(), telefono.to_string()),
    }
}

fn campo_prefijo(seleccionado: &str) -> Campo {
    let prefijos = prefijos_celular();
    Campo::seleccion("prefijo", "Prefijo", opciones_texto(&prefijos, seleccionado)).requerido()
}

/// Tabla con buscador de texto y paginacion
fn tabla_con_busqueda(
    sesion: &SesionActiva,
    consulta: &Consulta,
    titulo: &str,
    base: &str,
    columnas: Vec<&'static str>,
) -> TablaVista {
    let mut vista = TablaVista::new(Layout::new(sesion, consulta.mensaje()), titulo, columnas);
    vista.filtro_accion = base.to_string();
    vista.filtros = vec![Campo::texto("busqueda", "Buscar", consulta.texto("busqueda"))];
    vista.botones = vec![Accion::enlace("Nuevo", format!("{}/nuevo", base))];
    vista
}

fn acciones_fila(base: &str, id: i64) -> Vec<Accion> {
    vec![
        Accion::enlace("Editar", format!("{}/{}/editar", base, id)),
        Accion::post("Eliminar", format!("{}/{}/eliminar", base, id), "¿Eliminar el registro?"),
    ]
}

fn destino(base: &str, id: Option<i64>) -> String {
    match id {
        Some(id) => format!("{}/{}/editar", base, id),
        None => format!("{}/nuevo", base),
    }
}

// ============================================
// Personal
// ============================================

pub async fn personal(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let consulta = Consulta::new(params);
    let busqueda = consulta.opcion("busqueda");
    let pagina = personal::listar_personal(&state.db, busqueda.as_deref(), consulta.pagina())?;
    let mut vista = tabla_con_busqueda(
        &sesion,
        &consulta,
        "Personal",
        "/personal",
        vec!["Nombre", "Email", "Telefono", "% Comision", "Activo"],
    );
    vista.paginacion = Some(Paginacion::new(&pagina, "/personal", &consulta.codificada(&["busqueda"])));
    vista.filas = pagina
        .items
        .into_iter()
        .map(|p| Fila {
            acciones: acciones_fila("/personal", p.id),
            celdas: vec![
                p.nombre_completo(),
                p.email,
                p.telefono,
                format!("{}%", p.porcentaje_comision),
                si_no(p.activo),
            ],
        })
        .collect();
    render(&vista)
}

fn formulario_personal(sesion: &SesionActiva, id: Option<i64>, d: &DatosPersonal) -> FormularioVista {
    let titulo = if id.is_some() { "Editar personal" } else { "Nuevo personal" };
    let mut vista = FormularioVista::new(Layout::new(sesion, None), titulo, destino("/personal", id), "/personal");
    vista.campos = vec![
        Campo::texto("nombre", "Nombre", d.nombre.as_str()).requerido(),
        Campo::texto("apellidos", "Apellidos", d.apellidos.as_str()).requerido(),
        Campo::texto("email", "Email", d.email.as_str()).con_tipo("email").requerido(),
        campo_prefijo(&d.prefijo),
        Campo::texto("telefono", "Telefono (7 digitos)", d.telefono.as_str()).requerido(),
        Campo::numero(
            "porcentaje_comision",
            "% Comision",
            d.porcentaje_comision.map(|p| p.to_string()).unwrap_or_default(),
            "0.01",
        ),
    ];
    if id.is_some() {
        vista.campos.push(Campo::casilla("activo", "Activo", d.activo));
    }
    vista
}

fn datos_personal(campos: &Campos) -> DatosPersonal {
    DatosPersonal {
        nombre: campos.texto("nombre"),
        apellidos: campos.texto("apellidos"),
        email: campos.texto("email"),
        prefijo: campos.texto("prefijo"),
        telefono: campos.texto("telefono"),
        porcentaje_comision: campos.numero("porcentaje_comision"),
        activo: campos.bool("activo"),
    }
}

pub async fn nuevo_personal(sesion: SesionActiva) -> Result<Response, AppError> {
    let datos = DatosPersonal {
        porcentaje_comision: Some(50.0),
        ..Default::default()
    };
    render(&formulario_personal(&sesion, None, &datos))
}

pub async fn crear_personal(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Form(pares): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let campos = Campos::new(pares);
    campos.verificar_csrf(&sesion)?;
    let datos = datos_personal(&campos);
    match personal::crear_personal(&state.db, &datos) {
        Ok(_) => Ok(redirigir("/personal", "creado")),
        Err(AppError::Validacion(errores)) => {
            let mut vista = formulario_personal(&sesion, None, &datos);
            vista.errores = errores;
            render_invalido(&vista)
        }
        Err(e) => Err(e),
    }
}

pub async fn editar_personal(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let p = personal::obtener_personal(&state.db, id)?;
    let (prefijo, telefono) = partir_telefono(&p.telefono);
    let datos = DatosPersonal {
        nombre: p.nombre,
        apellidos: p.apellidos,
        email: p.email,
        prefijo,
        telefono,
        porcentaje_comision: Some(p.porcentaje_comision),
        activo: p.activo,
    };
    render(&formulario_personal(&sesion, Some(id), &datos))
}

pub async fn actualizar_personal(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Path(id): Path<i64>,
    Form(pares): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let campos = Campos::new(pares);
    campos.verificar_csrf(&sesion)?;
    let datos = datos_personal(&campos);
    match personal::actualizar_personal(&state.db, id, &datos) {
        Ok(()) => Ok(redirigir("/personal", "actualizado")),
        Err(AppError::Validacion(errores)) => {
            let mut vista = formulario_personal(&sesion, Some(id), &datos);
            vista.errores = errores;
            render_invalido(&vista)
        }
        Err(e) => Err(e),
    }
}

pub async fn eliminar_personal(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Path(id): Path<i64>,
    Form(pares): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    Campos::new(pares).verificar_csrf(&sesion)?;
    personal::eliminar_personal(&state.db, &sesion, id)?;
    Ok(redirigir("/personal", "eliminado"))
}

// ============================================
// Clientes
// ============================================

pub async fn clientes(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let consulta = Consulta::new(params);
    let busqueda = consulta.opcion("busqueda");
    let pagina = clientes::listar_clientes(&state.db, busqueda.as_deref(), consulta.pagina())?;
    let mut vista = tabla_con_busqueda(
        &sesion,
        &consulta,
        "Clientes",
        "/clientes",
        vec!["Nombre", "Cedula", "Telefono", "Email", "Instagram", "Tipo", "Activo"],
    );
    vista.paginacion = Some(Paginacion::new(&pagina, "/clientes", &consulta.codificada(&["busqueda"])));
    vista.filas = pagina
        .items
        .into_iter()
        .map(|c| Fila {
            acciones: acciones_fila("/clientes", c.id),
            celdas: vec![
                c.nombre_completo(),
                c.cedula.clone(),
                c.telefono.clone(),
                o_guion(c.email.as_deref()),
                o_guion(c.instagram.as_deref()),
                c.tipo.clone(),
                si_no(c.activo),
            ],
        })
        .collect();
    render(&vista)
}

fn formulario_cliente(sesion: &SesionActiva, id: Option<i64>, d: &DatosCliente) -> FormularioVista {
    let titulo = if id.is_some() { "Editar cliente" } else { "Nuevo cliente" };
    let mut vista = FormularioVista::new(Layout::new(sesion, None), titulo, destino("/clientes", id), "/clientes");
    vista.campos = vec![
        Campo::texto("nombre", "Nombre", d.nombre.as_str()).requerido(),
        Campo::texto("apellidos", "Apellidos", d.apellidos.as_str()).requerido(),
        Campo::texto("cedula", "Cedula", d.cedula.as_str()).requerido(),
        Campo::texto("email", "Email", d.email.clone().unwrap_or_default()).con_tipo("email"),
        campo_prefijo(&d.prefijo),
        Campo::texto("telefono", "Telefono (7 digitos)", d.telefono.as_str()).requerido(),
        Campo::texto("instagram", "Instagram", d.instagram.clone().unwrap_or_default()),
        Campo::seleccion("tipo", "Tipo", opciones_texto(&TIPOS_CLIENTE, &d.tipo)).requerido(),
    ];
    if id.is_some() {
        vista.campos.push(Campo::casilla("activo", "Activo", d.activo));
    }
    vista
}

fn datos_cliente(campos: &Campos) -> DatosCliente {
    DatosCliente {
        nombre: campos.texto("nombre"),
        apellidos: campos.texto("apellidos"),
        cedula: campos.texto("cedula"),
        email: campos.opcion("email"),
        prefijo: campos.texto("prefijo"),
        telefono: campos.texto("telefono"),
        instagram: campos.opcion("instagram"),
        tipo: campos.texto("tipo"),
        activo: campos.bool("activo"),
    }
}

pub async fn nuevo_cliente(sesion: SesionActiva) -> Result<Response, AppError> {
    let datos = DatosCliente {
        tipo: TIPOS_CLIENTE[0].to_string(),
        ..Default::default()
    };
    render(&formulario_cliente(&sesion, None, &datos))
}

pub async fn crear_cliente(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Form(pares): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let campos = Campos::new(pares);
    campos.verificar_csrf(&sesion)?;
    let datos = datos_cliente(&campos);
    match clientes::crear_cliente(&state.db, &datos) {
        Ok(_) => Ok(redirigir("/clientes", "creado")),
        Err(AppError::Validacion(errores)) => {
            let mut vista = formulario_cliente(&sesion, None, &datos);
            vista.errores = errores;
            render_invalido(&vista)
        }
        Err(e) => Err(e),
    }
}

pub async fn editar_cliente(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let c = clientes::obtener_cliente(&state.db, id)?;
    let (prefijo, telefono) = partir_telefono(&c.telefono);
    let datos = DatosCliente {
        nombre: c.nombre,
        apellidos: c.apellidos,
        cedula: c.cedula,
        email: c.email,
        prefijo,
        telefono,
        instagram: c.instagram,
        tipo: c.tipo,
        activo: c.activo,
    };
    render(&formulario_cliente(&sesion, Some(id), &datos))
}

pub async fn actualizar_cliente(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Path(id): Path<i64>,
    Form(pares): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let campos = Campos::new(pares);
    campos.verificar_csrf(&sesion)?;
    let datos = datos_cliente(&campos);
    match clientes::actualizar_cliente(&state.db, id, &datos) {
        Ok(()) => Ok(redirigir("/clientes", "actualizado")),
        Err(AppError::Validacion(errores)) => {
            let mut vista = formulario_cliente(&sesion, Some(id), &datos);
            vista.errores = errores;
            render_invalido(&vista)
        }
        Err(e) => Err(e),
    }
}

pub async fn eliminar_cliente(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Path(id): Path<i64>,
    Form(pares): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    Campos::new(pares).verificar_csrf(&sesion)?;
    clientes::eliminar_cliente(&state.db, &sesion, id)?;
    Ok(redirigir("/clientes", "eliminado"))
}

// ============================================
// Proveedores
// ============================================

pub async fn proveedores(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let consulta = Consulta::new(params);
    let busqueda = consulta.opcion("busqueda");
    let pagina = proveedores::listar_proveedores(&state.db, busqueda.as_deref(), consulta.pagina())?;
    let mut vista = tabla_con_busqueda(
        &sesion,
        &consulta,
        "Proveedores",
        "/proveedores",
        vec!["Documento", "Razon social", "Email", "Telefono", "Direccion", "Activo"],
    );
    vista.paginacion = Some(Paginacion::new(&pagina, "/proveedores", &consulta.codificada(&["busqueda"])));
    vista.filas = pagina
        .items
        .into_iter()
        .map(|p| Fila {
            acciones: acciones_fila("/proveedores", p.id),
            celdas: vec![
                format!("{} {}", p.tipo_documento, p.numero_documento),
                p.razon_social.clone(),
                o_guion(p.email.as_deref()),
                o_guion(p.telefono.as_deref()),
                o_guion(p.direccion.as_deref()),
                si_no(p.activo),
            ],
        })
        .collect();
    render(&vista)
}

fn formulario_proveedor(sesion: &SesionActiva, id: Option<i64>, d: &DatosProveedor) -> FormularioVista {
    let titulo = if id.is_some() { "Editar proveedor" } else { "Nuevo proveedor" };
    let mut vista =
        FormularioVista::new(Layout::new(sesion, None), titulo, destino("/proveedores", id), "/proveedores");
    vista.campos = vec![
        Campo::seleccion(
            "tipo_documento",
            "Tipo de documento",
            opciones_texto(&TIPOS_DOCUMENTO, &d.tipo_documento),
        )
        .requerido(),
        Campo::texto("numero_documento", "Numero de documento", d.numero_documento.as_str()).requerido(),
        Campo::texto("razon_social", "Razon social", d.razon_social.as_str()).requerido(),
        Campo::texto("email", "Email", d.email.clone().unwrap_or_default()).con_tipo("email"),
        Campo::texto("telefono", "Telefono", d.telefono.clone().unwrap_or_default()),
        Campo::texto("direccion", "Direccion", d.direccion.clone().unwrap_or_default()),
    ];
    if id.is_some() {
        vista.campos.push(Campo::casilla("activo", "Activo", d.activo));
    }
    vista
}

fn datos_proveedor(campos: &Campos) -> DatosProveedor {
    DatosProveedor {
        tipo_documento: campos.texto("tipo_documento"),
        numero_documento: campos.texto("numero_documento"),
        razon_social: campos.texto("razon_social"),
        email: campos.opcion("email"),
        telefono: campos.opcion("telefono"),
        direccion: campos.opcion("direccion"),
        activo: campos.bool("activo"),
    }
}

pub async fn nuevo_proveedor(sesion: SesionActiva) -> Result<Response, AppError> {
    render(&formulario_proveedor(&sesion, None, &DatosProveedor::default()))
}

pub async fn crear_proveedor(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Form(pares): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let campos = Campos::new(pares);
    campos.verificar_csrf(&sesion)?;
    let datos = datos_proveedor(&campos);
    match proveedores::crear_proveedor(&state.db, &datos) {
        Ok(_) => Ok(redirigir("/proveedores", "creado")),
        Err(AppError::Validacion(errores)) => {
            let mut vista = formulario_proveedor(&sesion, None, &datos);
            vista.errores = errores;
            render_invalido(&vista)
        }
        Err(e) => Err(e),
    }
}

pub async fn editar_proveedor(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let p = proveedores::obtener_proveedor(&state.db, id)?;
    let datos = DatosProveedor {
        tipo_documento: p.tipo_documento,
        numero_documento: p.numero_documento,
        razon_social: p.razon_social,
        email: p.email,
        telefono: p.telefono,
        direccion: p.direccion,
        activo: p.activo,
    };
    render(&formulario_proveedor(&sesion, Some(id), &datos))
}

pub async fn actualizar_proveedor(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Path(id): Path<i64>,
    Form(pares): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let campos = Campos::new(pares);
    campos.verificar_csrf(&sesion)?;
    let datos = datos_proveedor(&campos);
    match proveedores::actualizar_proveedor(&state.db, id, &datos) {
        Ok(()) => Ok(redirigir("/proveedores", "actualizado")),
        Err(AppError::Validacion(errores)) => {
            let mut vista = formulario_proveedor(&sesion, Some(id), &datos);
            vista.errores = errores;
            render_invalido(&vista)
        }
        Err(e) => Err(e),
    }
}

pub async fn eliminar_proveedor(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Path(id): Path<i64>,
    Form(pares): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    Campos::new(pares).verificar_csrf(&sesion)?;
    proveedores::eliminar_proveedor(&state.db, &sesion, id)?;
    Ok(redirigir("/proveedores", "eliminado"))
}

// ============================================
// Procedimientos
// ============================================

pub async fn procedimientos(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let consulta = Consulta::new(params);
    let busqueda = consulta.opcion("busqueda");
    let pagina = procedimientos::listar_procedimientos(&state.db, busqueda.as_deref(), consulta.pagina())?;
    let mut vista = tabla_con_busqueda(
        &sesion,
        &consulta,
        "Procedimientos",
        "/procedimientos",
        vec!["Nombre", "Precio", "Activo"],
    );
    vista.paginacion = Some(Paginacion::new(
        &pagina,
        "/procedimientos",
        &consulta.codificada(&["busqueda"]),
    ));
    vista.filas = pagina
        .items
        .into_iter()
        .map(|p| Fila {
            acciones: acciones_fila("/procedimientos", p.id),
            celdas: vec![
                p.nombre,
                p.precio.map(formatear_moneda).unwrap_or_else(|| "-".to_string()),
                si_no(p.activo),
            ],
        })
        .collect();
    render(&vista)
}

fn opciones_precios(state: &AppState) -> Result<Vec<ItemCatalogo>, AppError> {
    Ok(precios::listar_precios(&state.db)?
        .into_iter()
        .map(|p| ItemCatalogo {
            id: p.id,
            nombre: formatear_moneda(p.monto),
        })
        .collect())
}

fn formulario_procedimiento(
    state: &AppState,
    sesion: &SesionActiva,
    id: Option<i64>,
    d: &DatosProcedimiento,
) -> Result<FormularioVista, AppError> {
    let titulo = if id.is_some() { "Editar procedimiento" } else { "Nuevo procedimiento" };
    let mut vista = FormularioVista::new(
        Layout::new(sesion, None),
        titulo,
        destino("/procedimientos", id),
        "/procedimientos",
    );
    vista.campos = vec![
        Campo::texto("nombre", "Nombre", d.nombre.as_str()).requerido(),
        Campo::seleccion(
            "precio_id",
            "Precio",
            opciones(&opciones_precios(state)?, d.precio_id, Some("Seleccione...")),
        )
        .requerido(),
    ];
    if id.is_some() {
        vista.campos.push(Campo::casilla("activo", "Activo", d.activo));
    }
    Ok(vista)
}

fn datos_procedimiento(campos: &Campos) -> DatosProcedimiento {
    DatosProcedimiento {
        nombre: campos.texto("nombre"),
        precio_id: campos.id("precio_id"),
        activo: campos.bool("activo"),
    }
}

pub async fn nuevo_procedimiento(
    State(state): State<AppState>,
    sesion: SesionActiva,
) -> Result<Response, AppError> {
    render(&formulario_procedimiento(&state, &sesion, None, &DatosProcedimiento::default())?)
}

pub async fn crear_procedimiento(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Form(pares): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let campos = Campos::new(pares);
    campos.verificar_csrf(&sesion)?;
    let datos = datos_procedimiento(&campos);
    match procedimientos::crear_procedimiento(&state.db, &datos) {
        Ok(_) => Ok(redirigir("/procedimientos", "creado")),
        Err(AppError::Validacion(errores)) => {
            let mut vista = formulario_procedimiento(&state, &sesion, None, &datos)?;
            vista.errores = errores;
            render_invalido(&vista)
        }
        Err(e) => Err(e),
    }
}

pub async fn editar_procedimiento(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let p = procedimientos::obtener_procedimiento(&state.db, id)?;
    let datos = DatosProcedimiento {
        nombre: p.nombre,
        precio_id: p.precio_id,
        activo: p.activo,
    };
    render(&formulario_procedimiento(&state, &sesion, Some(id), &datos)?)
}

pub async fn actualizar_procedimiento(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Path(id): Path<i64>,
    Form(pares): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let campos = Campos::new(pares);
    campos.verificar_csrf(&sesion)?;
    let datos = datos_procedimiento(&campos);
    match procedimientos::actualizar_procedimiento(&state.db, &sesion, id, &datos) {
        Ok(()) => Ok(redirigir("/procedimientos", "actualizado")),
        Err(AppError::Validacion(errores)) => {
            let mut vista = formulario_procedimiento(&state, &sesion, Some(id), &datos)?;
            vista.errores = errores;
            render_invalido(&vista)
        }
        Err(e) => Err(e),
    }
}

pub async fn eliminar_procedimiento(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Path(id): Path<i64>,
    Form(pares): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    Campos::new(pares).verificar_csrf(&sesion)?;
    procedimientos::eliminar_procedimiento(&state.db, &sesion, id)?;
    Ok(redirigir("/procedimientos", "eliminado"))
}

// ============================================
// Precios
// ============================================

pub async fn precios(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let lista = precios::listar_precios(&state.db)?;
    let mut vista = TablaVista::new(
        Layout::new(&sesion, Consulta::new(params).mensaje()),
        "Precios",
        vec!["Monto"],
    );
    vista.filas = lista
        .into_iter()
        .map(|p| Fila {
            acciones: acciones_fila("/precios", p.id),
            celdas: vec![formatear_moneda(p.monto)],
        })
        .collect();
    vista.botones = vec![Accion::enlace("Nuevo precio", "/precios/nuevo")];
    render(&vista)
}

fn formulario_precio(sesion: &SesionActiva, id: Option<i64>, monto: &str) -> FormularioVista {
    let titulo = if id.is_some() { "Editar precio" } else { "Nuevo precio" };
    let mut vista = FormularioVista::new(Layout::new(sesion, None), titulo, destino("/precios", id), "/precios");
    vista.campos = vec![Campo::numero("monto", "Monto", monto, "0.01").requerido()];
    vista
}

pub async fn nuevo_precio(sesion: SesionActiva) -> Result<Response, AppError> {
    render(&formulario_precio(&sesion, None, ""))
}

pub async fn crear_precio(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Form(pares): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let campos = Campos::new(pares);
    campos.verificar_csrf(&sesion)?;
    match precios::crear_precio(&state.db, campos.numero("monto")) {
        Ok(_) => Ok(redirigir("/precios", "creado")),
        Err(AppError::Validacion(errores)) => {
            let mut vista = formulario_precio(&sesion, None, &campos.texto("monto"));
            vista.errores = errores;
            render_invalido(&vista)
        }
        Err(e) => Err(e),
    }
}

pub async fn editar_precio(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let precio = precios::obtener_precio(&state.db, id)?;
    render(&formulario_precio(&sesion, Some(id), &precio.monto.to_string()))
}

pub async fn actualizar_precio(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Path(id): Path<i64>,
    Form(pares): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let campos = Campos::new(pares);
    campos.verificar_csrf(&sesion)?;
    match precios::actualizar_precio(&state.db, id, campos.numero("monto")) {
        Ok(()) => Ok(redirigir("/precios", "actualizado")),
        Err(AppError::Validacion(errores)) => {
            let mut vista = formulario_precio(&sesion, Some(id), &campos.texto("monto"));
            vista.errores = errores;
            render_invalido(&vista)
        }
        Err(e) => Err(e),
    }
}

pub async fn eliminar_precio(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Path(id): Path<i64>,
    Form(pares): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    Campos::new(pares).verificar_csrf(&sesion)?;
    precios::eliminar_precio(&state.db, &sesion, id)?;
    Ok(redirigir("/precios", "eliminado"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partir_telefono() {
        assert_eq!(
            partir_telefono("3101234567"),
            ("310".to_string(), "1234567".to_string())
        );
        assert_eq!(partir_telefono("31"), (String::new(), "31".to_string()));
    }
}
