use std::fmt;

/// Reasons a `!color` argument is rejected
#[derive(Debug, Clone, PartialEq)]
pub enum ColorError {
    Empty,
    InvalidHex(String),
    InvalidFunction(String),
    UnknownName(String),
}

impl fmt::Display for ColorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorError::Empty => write!(f, "color is empty"),
            ColorError::InvalidHex(s) => write!(f, "invalid hex color '{}'", s),
            ColorError::InvalidFunction(s) => write!(f, "invalid color function '{}'", s),
            ColorError::UnknownName(s) => write!(f, "unknown color name '{}'", s),
        }
    }
}

impl std::error::Error for ColorError {}

const NAMED_COLORS: &[&str] = &[
    "aliceblue", "antiquewhite", "aqua", "aquamarine", "azure", "beige", "bisque", "black",
    "blanchedalmond", "blue", "blueviolet", "brown", "burlywood", "burntsienna", "cadetblue",
    "chartreuse", "chocolate", "coral", "cornflowerblue", "cornsilk", "crimson", "cyan",
    "darkblue", "darkcyan", "darkgoldenrod", "darkgray", "darkgreen", "darkgrey", "darkkhaki",
    "darkmagenta", "darkolivegreen", "darkorange", "darkorchid", "darkred", "darksalmon",
    "darkseagreen", "darkslateblue", "darkslategray", "darkslategrey", "darkturquoise",
    "darkviolet", "deeppink", "deepskyblue", "dimgray", "dimgrey", "dodgerblue", "firebrick",
    "floralwhite", "forestgreen", "fuchsia", "gainsboro", "ghostwhite", "gold", "goldenrod",
    "gray", "green", "greenyellow", "grey", "honeydew", "hotpink", "indianred", "indigo",
    "ivory", "khaki", "lavender", "lavenderblush", "lawngreen", "lemonchiffon", "lightblue",
    "lightcoral", "lightcyan", "lightgoldenrodyellow", "lightgray", "lightgreen", "lightgrey",
    "lightpink", "lightsalmon", "lightseagreen", "lightskyblue", "lightslategray",
    "lightslategrey", "lightsteelblue", "lightyellow", "lime", "limegreen", "linen", "magenta",
    "maroon", "mediumaquamarine", "mediumblue", "mediumorchid", "mediumpurple",
    "mediumseagreen", "mediumslateblue", "mediumspringgreen", "mediumturquoise",
    "mediumvioletred", "midnightblue", "mintcream", "mistyrose", "moccasin", "navajowhite",
    "navy", "oldlace", "olive", "olivedrab", "orange", "orangered", "orchid", "palegoldenrod",
    "palegreen", "paleturquoise", "palevioletred", "papayawhip", "peachpuff", "peru", "pink",
    "plum", "powderblue", "purple", "rebeccapurple", "red", "rosybrown", "royalblue",
    "saddlebrown", "salmon", "sandybrown", "seagreen", "seashell", "sienna", "silver",
    "skyblue", "slateblue", "slategray", "slategrey", "snow", "springgreen", "steelblue", "tan",
    "teal", "thistle", "tomato", "transparent", "turquoise", "violet", "wheat", "white",
    "whitesmoke", "yellow", "yellowgreen",
];

/// Checks a user supplied color the way CSS-ish color parsers accept it.
///
/// Accepted: named colors, hex with or without `#` (3, 4, 6 or 8 digits), and
/// `rgb`/`rgba`/`hsl`/`hsla`/`hsv`/`hsva` functions with comma or space
/// separated numeric or percentage arguments.
pub fn validate_color(value: &str) -> Result<(), ColorError> {
    let value = value.trim().to_ascii_lowercase();
    if value.is_empty() {
        return Err(ColorError::Empty);
    }

    if NAMED_COLORS.binary_search(&value.as_str()).is_ok() {
        return Ok(());
    }

    if let Some(open) = value.find('(') {
        return validate_function(&value, open);
    }

    let hex = value.strip_prefix('#').unwrap_or(&value);
    let is_hex = matches!(hex.len(), 3 | 4 | 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit());
    if is_hex {
        Ok(())
    } else if value.starts_with('#') || hex.chars().all(|c| c.is_ascii_hexdigit()) {
        Err(ColorError::InvalidHex(value))
    } else {
        Err(ColorError::UnknownName(value))
    }
}

fn validate_function(value: &str, open: usize) -> Result<(), ColorError> {
    let invalid = || ColorError::InvalidFunction(value.to_string());

    let name = value[..open].trim();
    let body = value[open + 1..].strip_suffix(')').ok_or_else(invalid)?;
    let args: Vec<&str> = body
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|a| !a.is_empty())
        .collect();

    let expected = match name {
        "rgb" | "hsl" | "hsv" => 3,
        "rgba" | "hsla" | "hsva" => 4,
        _ => return Err(invalid()),
    };
    if args.len() != expected {
        return Err(invalid());
    }

    let numeric = args.iter().all(|arg| {
        let number = arg.strip_suffix('%').unwrap_or(arg);
        number.parse::<f64>().map_or(false, f64::is_finite)
    });
    if numeric {
        Ok(())
    } else {
        Err(invalid())
    }
}
