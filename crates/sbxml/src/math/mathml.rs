//! MathML content markup to expression tree

use crate::error::{Error, ErrorKind, Result, Span};
use crate::math::node::{Constant, MathNode, Operator, Symbol};
use crate::xml::document::parse_document;
use crate::xml::node::XmlNode;

pub const MATHML_NAMESPACE: &str = "http://www.w3.org/1998/Math/MathML";

/// Read the expression held by a `<math>` element
///
/// Any other element is read as a bare expression.
pub fn read_math(node: &XmlNode) -> Result<MathNode> {
    if node.name() != "math" {
        return read_expression(node);
    }
    let mut elements = elements(node);
    let Some(first) = elements.next() else {
        return Err(malformed(node, "empty <math> element"));
    };
    if elements.next().is_some() {
        return Err(malformed(node, "<math> holds more than one expression"));
    }
    read_expression(first)
}

/// Parse MathML text
pub fn parse_math(xml: &str) -> Result<MathNode> {
    let doc = parse_document(xml)?;
    read_math(&doc.root)
}

fn elements(node: &XmlNode) -> impl Iterator<Item = &XmlNode> {
    node.children().iter().filter(|child| child.is_element())
}

fn text_content(node: &XmlNode) -> String {
    node.children()
        .iter()
        .filter(|child| child.is_text())
        .map(|child| child.characters())
        .collect()
}

fn malformed(node: &XmlNode, message: &str) -> Error {
    Error::with_message(
        ErrorKind::InvalidToken,
        Span::at(node.pos()),
        format!("{message} at <{}>", node.name()),
    )
}

fn unsupported(node: &XmlNode) -> Error {
    Error::at(
        ErrorKind::UnsupportedMathElement {
            name: node.name().to_string(),
        },
        node.pos(),
    )
}

fn read_expression(node: &XmlNode) -> Result<MathNode> {
    match node.name() {
        "cn" => read_number(node).map(MathNode::number),
        "ci" => {
            let id = text_content(node);
            let id = id.trim();
            if id.is_empty() {
                return Err(Error::at(ErrorKind::EmptyName, node.pos()));
            }
            Ok(MathNode::name(id))
        }
        "csymbol" => match read_symbol(node)? {
            Symbol::Delay => Err(malformed(node, "delay must be applied")),
            symbol => Ok(MathNode::symbol(symbol, Vec::new())),
        },
        "apply" => read_apply(node),
        "piecewise" => read_piecewise(node),
        "lambda" => read_lambda(node),
        "semantics" => elements(node)
            .next()
            .ok_or_else(|| malformed(node, "empty <semantics> element"))
            .and_then(read_expression),
        name => Constant::from_element(name)
            .map(MathNode::constant)
            .ok_or_else(|| unsupported(node)),
    }
}

fn read_number(node: &XmlNode) -> Result<f64> {
    let mut parts = vec![String::new()];
    for child in node.children() {
        if child.is_text() {
            if let Some(part) = parts.last_mut() {
                part.push_str(child.characters());
            }
        } else if child.name() == "sep" {
            parts.push(String::new());
        }
    }

    let invalid = || {
        Error::at(
            ErrorKind::InvalidNumber {
                text: parts.join(" "),
            },
            node.pos(),
        )
    };

    let kind = node.attr_value("type").unwrap_or("real");
    match (kind, parts.as_slice()) {
        ("real", [text]) => text.trim().parse::<f64>().map_err(|_| invalid()),
        ("integer", [text]) => {
            let text = text.trim();
            text.parse::<i64>()
                .ok()
                .and_then(|_| text.parse::<f64>().ok())
                .ok_or_else(invalid)
        }
        ("e-notation", [mantissa, exponent]) => {
            let mantissa = mantissa.trim().parse::<f64>().map_err(|_| invalid())?;
            let exponent = exponent.trim().parse::<f64>().map_err(|_| invalid())?;
            Ok(mantissa * 10_f64.powf(exponent))
        }
        ("rational", [numerator, denominator]) => {
            let numerator = numerator.trim().parse::<f64>().map_err(|_| invalid())?;
            let denominator = denominator.trim().parse::<f64>().map_err(|_| invalid())?;
            Ok(numerator / denominator)
        }
        ("real" | "integer" | "e-notation" | "rational", _) => Err(invalid()),
        (other, _) => Err(Error::at(
            ErrorKind::UnsupportedMathElement {
                name: format!("cn type=\"{other}\""),
            },
            node.pos(),
        )),
    }
}

fn read_symbol(node: &XmlNode) -> Result<Symbol> {
    let url = node
        .attr_value("definitionURL")
        .ok_or_else(|| malformed(node, "csymbol without definitionURL"))?;
    Symbol::from_url(url).ok_or_else(|| {
        Error::at(
            ErrorKind::UnsupportedMathElement {
                name: format!("csymbol {url}"),
            },
            node.pos(),
        )
    })
}

fn read_single(node: &XmlNode) -> Result<MathNode> {
    let mut inner = elements(node);
    match (inner.next(), inner.next()) {
        (Some(only), None) => read_expression(only),
        _ => Err(malformed(node, "expected exactly one child expression")),
    }
}

fn read_apply(node: &XmlNode) -> Result<MathNode> {
    let mut children = elements(node);
    let Some(head) = children.next() else {
        return Err(malformed(node, "empty <apply> element"));
    };

    let mut qualifier = None;
    let mut args = Vec::new();
    for child in children {
        match child.name() {
            "logbase" | "degree" => {
                if qualifier.is_some() {
                    return Err(malformed(child, "repeated qualifier"));
                }
                qualifier = Some((child.name(), read_single(child)?));
            }
            _ => args.push(read_expression(child)?),
        }
    }

    match head.name() {
        "ci" => {
            if qualifier.is_some() {
                return Err(malformed(node, "qualifier on a function call"));
            }
            let function = text_content(head);
            Ok(MathNode::call(function.trim(), args))
        }
        "csymbol" => match read_symbol(head)? {
            Symbol::Delay if qualifier.is_none() => Ok(MathNode::symbol(Symbol::Delay, args)),
            _ => Err(malformed(head, "csymbol cannot be applied")),
        },
        name => {
            let op = Operator::from_element(name).ok_or_else(|| unsupported(head))?;
            match (op, qualifier) {
                (_, None) => Ok(MathNode::apply(op, args)),
                (Operator::Log, Some(("logbase", base))) | (Operator::Root, Some(("degree", base))) => {
                    args.insert(0, base);
                    Ok(MathNode::apply(op, args))
                }
                (_, Some(_)) => Err(malformed(node, "qualifier does not fit the operator")),
            }
        }
    }
}

fn read_piecewise(node: &XmlNode) -> Result<MathNode> {
    let mut pieces = Vec::new();
    let mut otherwise = None;

    for child in elements(node) {
        match child.name() {
            "piece" => {
                let mut parts = elements(child);
                let (Some(value), Some(condition), None) = (parts.next(), parts.next(), parts.next())
                else {
                    return Err(malformed(child, "<piece> needs a value and a condition"));
                };
                pieces.push(read_expression(value)?);
                pieces.push(read_expression(condition)?);
            }
            "otherwise" => {
                if otherwise.is_some() {
                    return Err(malformed(child, "repeated <otherwise>"));
                }
                otherwise = Some(read_single(child)?);
            }
            _ => return Err(unsupported(child)),
        }
    }

    pieces.extend(otherwise);
    Ok(MathNode::piecewise(pieces))
}

fn read_lambda(node: &XmlNode) -> Result<MathNode> {
    let mut params = Vec::new();
    let mut body = None;

    for child in elements(node) {
        if child.name() == "bvar" {
            let param = read_single(child)?;
            let Some(id) = param.as_name() else {
                return Err(malformed(child, "<bvar> must hold a <ci>"));
            };
            params.push(id.to_string());
        } else if body.is_none() {
            body = Some(read_expression(child)?);
        } else {
            return Err(malformed(node, "<lambda> holds more than one body"));
        }
    }

    body.map(|body| MathNode::lambda(params, body))
        .ok_or_else(|| malformed(node, "<lambda> without a body"))
}
