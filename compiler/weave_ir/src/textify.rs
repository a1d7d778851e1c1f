//! Human-readable class listings.

use std::fmt::Write;

use crate::annotation::{Annotation, AnnotationValue};
use crate::insn::Insn;
use crate::node::{ClassNode, MethodNode};

/// Render a full class listing.
pub fn textify_class(class: &ClassNode) -> String {
    let mut out = String::new();
    for ann in &class.annotations {
        let _ = writeln!(out, "{}", render_annotation(ann));
    }
    let kind = if class.is_interface() {
        "interface"
    } else {
        "class"
    };
    let _ = write!(out, "{kind} {} [{:#06x}]", class.name, class.access.bits());
    if let Some(super_name) = &class.super_name {
        let _ = write!(out, " extends {super_name}");
    }
    if !class.interfaces.is_empty() {
        let _ = write!(out, " implements {}", class.interfaces.join(", "));
    }
    out.push_str(" {\n");
    if let Some(sig) = &class.signature {
        let _ = writeln!(out, "  // signature {sig}");
    }

    for field in &class.fields {
        for ann in &field.annotations {
            let _ = writeln!(out, "  {}", render_annotation(ann));
        }
        let _ = writeln!(
            out,
            "  field {}:{} [{:#06x}]",
            field.name,
            field.desc,
            field.access.bits()
        );
    }
    for method in &class.methods {
        out.push('\n');
        out.push_str(&textify_method(method));
    }
    out.push_str("}\n");
    out
}

/// Render one method with its body, indented for inclusion in a class listing.
pub fn textify_method(method: &MethodNode) -> String {
    let mut out = String::new();
    for ann in &method.annotations {
        let _ = writeln!(out, "  {}", render_annotation(ann));
    }
    let _ = writeln!(
        out,
        "  method {}{} [{:#06x}] locals={} stack={}",
        method.name,
        method.desc,
        method.access.bits(),
        method.max_locals,
        method.max_stack
    );
    for insn in &method.insns {
        let indent = if matches!(insn, Insn::Label(_)) {
            "   "
        } else {
            "     "
        };
        let _ = writeln!(out, "{indent}{insn}");
    }
    out
}

fn render_annotation(ann: &Annotation) -> String {
    if ann.values.is_empty() {
        return format!("@{}", ann.desc);
    }
    let values: Vec<String> = ann
        .values
        .iter()
        .map(|(k, v)| format!("{k}={}", render_value(v)))
        .collect();
    format!("@{}({})", ann.desc, values.join(", "))
}

fn render_value(value: &AnnotationValue) -> String {
    match value {
        AnnotationValue::Bool(b) => b.to_string(),
        AnnotationValue::Int(i) => i.to_string(),
        AnnotationValue::Str(s) => format!("{s:?}"),
        AnnotationValue::List(items) => {
            let items: Vec<String> = items.iter().map(render_value).collect();
            format!("{{{}}}", items.join(", "))
        }
        AnnotationValue::Annotation(a) => render_annotation(a),
    }
}
