use std::collections::HashMap;

use axum::extract::{Form, Path, Query, State};
use axum::response::Response;

use super::vistas::{
    opciones, opciones_texto, Accion, Campo, Fila, FormularioVista, Layout, Opcion, Paginacion,
    TablaVista,
};
use super::{redirigir, render, render_invalido, si_no, Campos, Consulta};
use crate::commands::{auditoria, bancos, usuarios, verificar_supervisor};
use crate::error::AppError;
use crate::models::{
    EdicionUsuario, FiltroAuditoria, ItemCatalogo, NuevoUsuario, SesionActiva, ACCIONES,
};
use crate::AppState;

// ============================================
// Usuarios
// ============================================

pub async fn usuarios(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let lista = usuarios::listar_usuarios(&state.db, &sesion)?;
    let mut vista = TablaVista::new(
        Layout::new(&sesion, Consulta::new(params).mensaje()),
        "Usuarios",
        vec!["Nombre", "Usuario", "Rol", "Activo"],
    );
    vista.filas = lista
        .into_iter()
        .map(|u| {
            let mut acciones = vec![Accion::enlace("Editar", format!("/admin/usuarios/{}/editar", u.id))];
            if u.id != sesion.usuario_id {
                acciones.push(Accion::post(
                    "Eliminar",
                    format!("/admin/usuarios/{}/eliminar", u.id),
                    "¿Eliminar el usuario?",
                ));
            }
            Fila {
                celdas: vec![u.nombre, u.username, u.rol, si_no(u.activo)],
                acciones,
            }
        })
        .collect();
    vista.botones = vec![Accion::enlace("Nuevo usuario", "/admin/usuarios/nuevo")];
    render(&vista)
}

fn formulario_usuario(
    state: &AppState,
    sesion: &SesionActiva,
    id: Option<i64>,
    nombre: &str,
    username: &str,
    rol_id: Option<i64>,
    activo: bool,
) -> Result<FormularioVista, AppError> {
    let roles = usuarios::listar_roles(&state.db)?;
    let (titulo, accion) = match id {
        Some(id) => ("Editar usuario", format!("/admin/usuarios/{}/editar", id)),
        None => ("Nuevo usuario", "/admin/usuarios/nuevo".to_string()),
    };
    let mut vista = FormularioVista::new(Layout::new(sesion, None), titulo, accion, "/admin/usuarios");
    vista.campos = vec![
        Campo::texto("nombre", "Nombre", nombre).requerido(),
        Campo::texto("username", "Usuario", username).requerido(),
        Campo::seleccion("rol_id", "Rol", opciones(&roles, rol_id, Some("Seleccione..."))).requerido(),
    ];
    if id.is_some() {
        vista.campos.push(Campo::texto("password", "Password (vacio = sin cambio)", "").con_tipo("password"));
        vista.campos.push(Campo::casilla("activo", "Activo", activo));
    } else {
        vista.campos.push(Campo::texto("password", "Password", "").con_tipo("password").requerido());
        vista.campos.push(
            Campo::texto("repetir_password", "Repetir password", "")
                .con_tipo("password")
                .requerido(),
        );
    }
    Ok(vista)
}

pub async fn nuevo_usuario(
    State(state): State<AppState>,
    sesion: SesionActiva,
) -> Result<Response, AppError> {
    verificar_supervisor(&sesion)?;
    render(&formulario_usuario(&state, &sesion, None, "", "", None, true)?)
}

pub async fn crear_usuario(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Form(pares): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let campos = Campos::new(pares);
    campos.verificar_csrf(&sesion)?;
    let datos = NuevoUsuario {
        nombre: campos.texto("nombre"),
        username: campos.texto("username"),
        password: campos.get("password").unwrap_or_default().to_string(),
        repetir_password: campos.get("repetir_password").unwrap_or_default().to_string(),
        rol_id: campos.id("rol_id"),
    };
    match usuarios::crear_usuario(&state.db, &sesion, &datos) {
        Ok(_) => Ok(redirigir("/admin/usuarios", "creado")),
        Err(AppError::Validacion(errores)) => {
            let mut vista =
                formulario_usuario(&state, &sesion, None, &datos.nombre, &datos.username, datos.rol_id, true)?;
            vista.errores = errores;
            render_invalido(&vista)
        }
        Err(e) => Err(e),
    }
}

pub async fn editar_usuario(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let u = usuarios::obtener_usuario(&state.db, &sesion, id)?;
    render(&formulario_usuario(
        &state,
        &sesion,
        Some(id),
        &u.nombre,
        &u.username,
        Some(u.rol_id),
        u.activo,
    )?)
}

pub async fn actualizar_usuario(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Path(id): Path<i64>,
    Form(pares): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let campos = Campos::new(pares);
    campos.verificar_csrf(&sesion)?;
    let datos = EdicionUsuario {
        nombre: campos.texto("nombre"),
        username: campos.texto("username"),
        password: campos.get("password").unwrap_or_default().to_string(),
        rol_id: campos.id("rol_id"),
        activo: campos.bool("activo"),
    };
    match usuarios::actualizar_usuario(&state.db, &sesion, id, &datos) {
        Ok(()) => Ok(redirigir("/admin/usuarios", "actualizado")),
        Err(AppError::Validacion(errores)) => {
            let mut vista = formulario_usuario(
                &state,
                &sesion,
                Some(id),
                &datos.nombre,
                &datos.username,
                datos.rol_id,
                datos.activo,
            )?;
            vista.errores = errores;
            render_invalido(&vista)
        }
        Err(e) => Err(e),
    }
}

pub async fn eliminar_usuario(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Path(id): Path<i64>,
    Form(pares): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    Campos::new(pares).verificar_csrf(&sesion)?;
    usuarios::eliminar_usuario(&state.db, &sesion, id)?;
    Ok(redirigir("/admin/usuarios", "eliminado"))
}

// ============================================
// Auditoria
// ============================================

pub async fn auditoria(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let consulta = Consulta::new(params);
    let filtro = FiltroAuditoria {
        accion: consulta.opcion("accion"),
        usuario_id: consulta.id("usuario_id"),
        fecha_inicio: consulta.opcion("fecha_inicio"),
        fecha_fin: consulta.opcion("fecha_fin"),
    };
    let pagina = auditoria::listar_auditoria(&state.db, &sesion, &filtro, consulta.pagina())?;
    let lista_usuarios: Vec<ItemCatalogo> = usuarios::listar_usuarios(&state.db, &sesion)?
        .into_iter()
        .map(|u| ItemCatalogo {
            id: u.id,
            nombre: u.nombre,
        })
        .collect();

    let mut acciones = opciones_texto(&ACCIONES, filtro.accion.as_deref().unwrap_or_default());
    acciones.insert(
        0,
        Opcion {
            valor: String::new(),
            etiqueta: "Todas".to_string(),
            seleccionada: filtro.accion.is_none(),
        },
    );

    let mut vista = TablaVista::new(
        Layout::new(&sesion, consulta.mensaje()),
        "Auditoria",
        vec!["Fecha", "Usuario", "Accion", "Tabla", "Registro", "Descripcion"],
    );
    vista.filtro_accion = "/admin/auditoria".to_string();
    vista.filtros = vec![
        Campo::seleccion("accion", "Accion", acciones),
        Campo::seleccion("usuario_id", "Usuario", opciones(&lista_usuarios, filtro.usuario_id, Some("Todos"))),
        Campo::fecha("fecha_inicio", "Desde", filtro.fecha_inicio.clone().unwrap_or_default()),
        Campo::fecha("fecha_fin", "Hasta", filtro.fecha_fin.clone().unwrap_or_default()),
    ];
    vista.paginacion = Some(Paginacion::new(
        &pagina,
        "/admin/auditoria",
        &consulta.codificada(&["accion", "usuario_id", "fecha_inicio", "fecha_fin"]),
    ));
    vista.filas = pagina
        .items
        .into_iter()
        .map(|r| Fila {
            celdas: vec![r.fecha, r.usuario, r.accion, r.tabla_afectada, r.registro_id, r.descripcion],
            acciones: Vec::new(),
        })
        .collect();
    render(&vista)
}

// ============================================
// Bancos
// ============================================

pub async fn bancos(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    verificar_supervisor(&sesion)?;
    let lista = bancos::listar_bancos(&state.db, false)?;
    let mut vista = TablaVista::new(
        Layout::new(&sesion, Consulta::new(params).mensaje()),
        "Bancos",
        vec!["Nombre", "Activo"],
    );
    vista.filas = lista
        .into_iter()
        .map(|b| Fila {
            acciones: vec![
                Accion::enlace("Editar", format!("/admin/bancos/{}/editar", b.id)),
                Accion::post("Eliminar", format!("/admin/bancos/{}/eliminar", b.id), "¿Eliminar el banco?"),
            ],
            celdas: vec![b.nombre, si_no(b.activo)],
        })
        .collect();
    vista.botones = vec![Accion::enlace("Nuevo banco", "/admin/bancos/nuevo")];
    render(&vista)
}

fn formulario_banco(sesion: &SesionActiva, id: Option<i64>, nombre: &str, activo: bool) -> FormularioVista {
    let (titulo, accion) = match id {
        Some(id) => ("Editar banco", format!("/admin/bancos/{}/editar", id)),
        None => ("Nuevo banco", "/admin/bancos/nuevo".to_string()),
    };
    let mut vista = FormularioVista::new(Layout::new(sesion, None), titulo, accion, "/admin/bancos");
    vista.campos = vec![Campo::texto("nombre", "Nombre", nombre).requerido()];
    if id.is_some() {
        vista.campos.push(Campo::casilla("activo", "Activo", activo));
    }
    vista
}

pub async fn nuevo_banco(sesion: SesionActiva) -> Result<Response, AppError> {
    verificar_supervisor(&sesion)?;
    render(&formulario_banco(&sesion, None, "", true))
}

pub async fn crear_banco(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Form(pares): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let campos = Campos::new(pares);
    campos.verificar_csrf(&sesion)?;
    let nombre = campos.texto("nombre");
    match bancos::crear_banco(&state.db, &sesion, &nombre) {
        Ok(_) => Ok(redirigir("/admin/bancos", "creado")),
        Err(AppError::Validacion(errores)) => {
            let mut vista = formulario_banco(&sesion, None, &nombre, true);
            vista.errores = errores;
            render_invalido(&vista)
        }
        Err(e) => Err(e),
    }
}

pub async fn editar_banco(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    verificar_supervisor(&sesion)?;
    let banco = bancos::obtener_banco(&state.db, id)?;
    render(&formulario_banco(&sesion, Some(id), &banco.nombre, banco.activo))
}

pub async fn actualizar_banco(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Path(id): Path<i64>,
    Form(pares): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let campos = Campos::new(pares);
    campos.verificar_csrf(&sesion)?;
    let nombre = campos.texto("nombre");
    let activo = campos.bool("activo");
    match bancos::actualizar_banco(&state.db, &sesion, id, &nombre, activo) {
        Ok(()) => Ok(redirigir("/admin/bancos", "actualizado")),
        Err(AppError::Validacion(errores)) => {
            let mut vista = formulario_banco(&sesion, Some(id), &nombre, activo);
            vista.errores = errores;
            render_invalido(&vista)
        }
        Err(e) => Err(e),
    }
}

pub async fn eliminar_banco(
    State(state): State<AppState>,
    sesion: SesionActiva,
    Path(id): Path<i64>,
    Form(pares): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    Campos::new(pares).verificar_csrf(&sesion)?;
    bancos::eliminar_banco(&state.db, &sesion, id)?;
    Ok(redirigir("/admin/bancos", "eliminado"))
}
