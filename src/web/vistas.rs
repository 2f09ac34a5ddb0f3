//! Estructuras de las plantillas askama y constructores de campos.

use askama::Template;

use crate::models::{ItemCatalogo, Pagina, SesionActiva};

/// Datos comunes de la barra superior
pub struct Layout {
    pub usuario: String,
    pub rol: &'static str,
    pub csrf: String,
    pub es_admin: bool,
    pub es_supervisor: bool,
    pub mensaje: Option<String>,
}

impl Layout {
    pub fn new(sesion: &SesionActiva, mensaje: Option<String>) -> Self {
        Self {
            usuario: sesion.nombre.clone(),
            rol: sesion.rol.nombre(),
            csrf: sesion.csrf.clone(),
            es_admin: sesion.es_admin(),
            es_supervisor: sesion.es_supervisor(),
            mensaje,
        }
    }
}

#[derive(Clone)]
pub struct Opcion {
    pub valor: String,
    pub etiqueta: String,
    pub seleccionada: bool,
}

/// Opciones de un select a partir de un catalogo, con una primera opcion vacia opcional
pub fn opciones(items: &[ItemCatalogo], seleccionado: Option<i64>, vacia: Option<&str>) -> Vec<Opcion> {
    let mut lista = Vec::with_capacity(items.len() + 1);
    if let Some(etiqueta) = vacia {
        lista.push(Opcion {
            valor: String::new(),
            etiqueta: etiqueta.to_string(),
            seleccionada: seleccionado.is_none(),
        });
    }
    lista.extend(items.iter().map(|i| Opcion {
        valor: i.id.to_string(),
        etiqueta: i.nombre.clone(),
        seleccionada: Some(i.id) == seleccionado,
    }));
    lista
}

pub fn opciones_texto(valores: &[&str], seleccionado: &str) -> Vec<Opcion> {
    valores
        .iter()
        .map(|v| Opcion {
            valor: v.to_string(),
            etiqueta: v.to_string(),
            seleccionada: *v == seleccionado,
        })
        .collect()
}

#[derive(Clone)]
pub struct Campo {
    pub nombre: String,
    pub etiqueta: String,
    /// text, number, date, email, password, hidden, select, checkbox, textarea
    pub tipo: &'static str,
    pub valor: String,
    pub opciones: Vec<Opcion>,
    pub paso: &'static str,
    pub requerido: bool,
}

impl Campo {
    pub fn texto(nombre: &str, etiqueta: &str, valor: impl Into<String>) -> Self {
        Self {
            nombre: nombre.to_string(),
            etiqueta: etiqueta.to_string(),
            tipo: "text",
            valor: valor.into(),
            opciones: Vec::new(),
            paso: "any",
            requerido: false,
        }
    }

    pub fn con_tipo(mut self, tipo: &'static str) -> Self {
        self.tipo = tipo;
        self
    }

    pub fn numero(nombre: &str, etiqueta: &str, valor: impl Into<String>, paso: &'static str) -> Self {
        let mut campo = Self::texto(nombre, etiqueta, valor).con_tipo("number");
        campo.paso = paso;
        campo
    }

    pub fn fecha(nombre: &str, etiqueta: &str, valor: impl Into<String>) -> Self {
        Self::texto(nombre, etiqueta, valor).con_tipo("date")
    }

    pub fn oculto(nombre: &str, valor: impl Into<String>) -> Self {
        Self::texto(nombre, "", valor).con_tipo("hidden")
    }

    pub fn seleccion(nombre: &str, etiqueta: &str, opciones: Vec<Opcion>) -> Self {
        let mut campo = Self::texto(nombre, etiqueta, "").con_tipo("select");
        campo.opciones = opciones;
        campo
    }

    pub fn casilla(nombre: &str, etiqueta: &str, marcado: bool) -> Self {
        Self::texto(nombre, etiqueta, if marcado { "on" } else { "" }).con_tipo("checkbox")
    }

    pub fn requerido(mut self) -> Self {
        self.requerido = true;
        self
    }

    pub fn marcado(&self) -> bool {
        !self.valor.is_empty()
    }
}

pub struct Accion {
    pub etiqueta: String,
    pub url: String,
    pub post: bool,
    pub confirmar: String,
}

impl Accion {
    pub fn enlace(etiqueta: &str, url: impl Into<String>) -> Self {
        Self {
            etiqueta: etiqueta.to_string(),
            url: url.into(),
            post: false,
            confirmar: String::new(),
        }
    }

    /// Boton que envia un formulario POST con el token CSRF
    pub fn post(etiqueta: &str, url: impl Into<String>, confirmar: &str) -> Self {
        Self {
            etiqueta: etiqueta.to_string(),
            url: url.into(),
            post: true,
            confirmar: confirmar.to_string(),
        }
    }
}

pub struct Fila {
    pub celdas: Vec<String>,
    pub acciones: Vec<Accion>,
}

pub struct Paginacion {
    pub pagina: i64,
    pub total_paginas: i64,
    pub total: i64,
    pub anterior: Option<String>,
    pub siguiente: Option<String>,
}

impl Paginacion {
    /// `consulta` son los filtros actuales ya codificados (sin `pagina`)
    pub fn new<T>(p: &Pagina<T>, base: &str, consulta: &str) -> Self {
        let url = |n: i64| {
            if consulta.is_empty() {
                format!("{}?pagina={}", base, n)
            } else {
                format!("{}?{}&pagina={}", base, consulta, n)
            }
        };
        Self {
            pagina: p.pagina,
            total_paginas: p.total_paginas,
            total: p.total,
            anterior: (p.pagina > 1).then(|| url(p.pagina - 1)),
            siguiente: (p.pagina < p.total_paginas).then(|| url(p.pagina + 1)),
        }
    }
}

#[derive(Template)]
#[template(path = "tabla.html")]
pub struct TablaVista {
    pub layout: Layout,
    pub titulo: String,
    pub filtro_accion: String,
    pub filtros: Vec<Campo>,
    pub columnas: Vec<&'static str>,
    pub filas: Vec<Fila>,
    pub totales: Vec<String>,
    pub paginacion: Option<Paginacion>,
    pub botones: Vec<Accion>,
}

impl TablaVista {
    pub fn new(layout: Layout, titulo: &str, columnas: Vec<&'static str>) -> Self {
        Self {
            layout,
            titulo: titulo.to_string(),
            filtro_accion: String::new(),
            filtros: Vec::new(),
            columnas,
            filas: Vec::new(),
            totales: Vec::new(),
            paginacion: None,
            botones: Vec::new(),
        }
    }
}

/// Grupo de filas repetidas (lineas de detalle) dentro de un formulario
pub struct SeccionLineas {
    pub titulo: String,
    pub columnas: Vec<&'static str>,
    pub filas: Vec<Vec<Campo>>,
}

pub struct Linea {
    pub etiqueta: String,
    pub valor: String,
}

impl Linea {
    pub fn new(etiqueta: &str, valor: impl Into<String>) -> Self {
        Self {
            etiqueta: etiqueta.to_string(),
            valor: valor.into(),
        }
    }
}

#[derive(Template)]
#[template(path = "formulario.html")]
pub struct FormularioVista {
    pub layout: Layout,
    pub titulo: String,
    pub accion: String,
    pub errores: Vec<String>,
    pub resumen: Vec<Linea>,
    pub campos: Vec<Campo>,
    pub secciones: Vec<SeccionLineas>,
    pub cancelar: String,
}

impl FormularioVista {
    pub fn new(layout: Layout, titulo: &str, accion: impl Into<String>, cancelar: &str) -> Self {
        Self {
            layout,
            titulo: titulo.to_string(),
            accion: accion.into(),
            errores: Vec::new(),
            resumen: Vec::new(),
            campos: Vec::new(),
            secciones: Vec::new(),
            cancelar: cancelar.to_string(),
        }
    }
}

pub struct Bloque {
    pub titulo: String,
    pub lineas: Vec<Linea>,
}

#[derive(Template)]
#[template(path = "resumen.html")]
pub struct ResumenVista {
    pub layout: Layout,
    pub titulo: String,
    pub filtro_accion: String,
    pub filtros: Vec<Campo>,
    pub bloques: Vec<Bloque>,
    pub botones: Vec<Accion>,
}

pub struct ActividadVista {
    pub id: String,
    pub hora: String,
    pub cliente: String,
    pub procedimiento: String,
    pub precio: String,
    pub pagos: String,
    pub descripcion: String,
    pub estado: String,
    pub anulada: bool,
    pub tiene_factura: bool,
}

pub struct FichaVista {
    pub fecha: String,
    pub personal: String,
    pub actividades: Vec<ActividadVista>,
    pub vales: Vec<ActividadVista>,
    pub total_actividades: String,
    pub total_vales: String,
}

#[derive(Template)]
#[template(path = "fichas.html")]
pub struct FichasVista {
    pub layout: Layout,
    pub filtros: Vec<Campo>,
    pub fichas: Vec<FichaVista>,
    pub paginacion: Paginacion,
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginVista {
    pub username: String,
    pub errores: Vec<String>,
    pub mensaje: Option<String>,
}
