//! Stylesheet generation from style options

use crate::markdown::style::StyleOptions;

/// Nominal page width of the preview (A4 at 96 dpi)
pub const PAGE_WIDTH_PX: u32 = 794;

/// Nominal page height of the preview (A4 at 96 dpi)
pub const PAGE_HEIGHT_PX: u32 = 1123;

/// Highlight theme embedded in exported documents
pub const HIGHLIGHT_THEME_CSS: &str = "code[class*=language-],pre[class*=language-]{color:#ccc;background:none;text-shadow:0 1px rgba(0,0,0,.3);font-family:Consolas,Monaco,'Andale Mono','Ubuntu Mono',monospace;font-size:1em;text-align:left;white-space:pre;word-spacing:normal;word-break:normal;word-wrap:normal;line-height:1.5;-moz-tab-size:4;-o-tab-size:4;tab-size:4;-webkit-hyphens:none;-moz-hyphens:none;-ms-hyphens:none;hyphens:none}pre[class*=language-]{padding:1em;margin:.5em 0;overflow:auto;border-radius:.3em}:not(pre)>code[class*=language-],pre[class*=language-]{background:#2d2d2d}:not(pre)>code[class*=language-]{padding:.1em;border-radius:.3em;white-space:normal}.token.comment,.token.block-comment,.token.prolog,.token.doctype,.token.cdata{color:#999}.token.punctuation{color:#ccc}.token.tag,.token.attr-name,.token.namespace,.token.deleted{color:#e2777a}.token.function-name{color:#6196cc}.token.boolean,.token.number,.token.function{color:#f08d49}.token.property,.token.class-name,.token.constant,.token.symbol{color:#f8c555}.token.selector,.token.important,.token.atrule,.token.keyword,.token.builtin{color:#cc99cd}.token.string,.token.char,.token.attr-value,.token.regex,.token.variable{color:#7ec699}.token.operator,.token.entity,.token.url{color:#67cdcc}.token.important,.token.bold{font-weight:700}.token.italic{font-style:italic}.token.entity{cursor:help}.token.inserted{color:green}";

/// Per-element rules declared by the style options
pub fn generate_css(o: &StyleOptions) -> String {
    format!(
        r#"
body {{
    font-family: {body_font};
    font-size: {body_font_size}px;
    line-height: {line_height};
    padding: {body_padding}px;
    margin: {body_margin}px;
}}

pre {{
    background: {pre_background};
    border-radius: {pre_border_radius}px;
    margin: {pre_margin}px 0;
    padding: 12px;
    color: #e5e7eb;
    font-family: {code_font};
}}

pre[class*="language-"] {{
    background: {pre_background} !important;
    border-radius: {pre_border_radius}px;
    margin: {pre_margin}px 0;
    padding: 12px;
    color: #e5e7eb;
    font-family: {code_font};
}}

pre[class*="language-"] code {{
    background: transparent;
    color: inherit;
}}

code {{
    font-family: {code_font};
    background: {code_background};
    padding: {code_padding}px;
    color: {code_color};
    border-radius: {code_border_radius}px;
    white-space: pre-wrap;
    word-wrap: break-word;
    overflow-wrap: anywhere;
}}

img {{
    max-width: {img_max_width}%;
}}

table {{
    border-collapse: {table_border_collapse};
    width: {table_width}%;
    margin: {table_margin}px 0;
}}

th {{
    border: {th_border};
    padding: {th_padding}px;
    background-color: {th_background_color};
}}

td {{
    border: {td_border};
    padding: {td_padding}px;
}}

blockquote {{
    border-left: {blockquote_border_left};
    padding-left: {blockquote_padding_left}px;
    margin-left: {blockquote_margin_left}px;
    color: {blockquote_color};
}}

h1 {{
    font-size: {h1_size}em;
    color: {h1_color};
    border-bottom: {h1_border_bottom};
    margin: {h1_margin_top}px 0 {h1_margin_bottom}px;
}}

h2 {{
    font-size: {h2_size}em;
    color: {h2_color};
    margin: {h2_margin_top}px 0 {h2_margin_bottom}px;
}}

h3 {{
    font-size: {h3_size}em;
    color: {h3_color};
    margin: {h3_margin_top}px 0 {h3_margin_bottom}px;
}}
"#,
        body_font = o.body_font,
        body_font_size = o.body_font_size,
        line_height = o.line_height,
        body_padding = o.body_padding,
        body_margin = o.body_margin,
        pre_background = o.pre_background,
        pre_border_radius = o.pre_border_radius,
        pre_margin = o.pre_margin,
        code_font = o.code_font,
        code_background = o.code_background,
        code_padding = o.code_padding,
        code_color = o.code_color,
        code_border_radius = o.code_border_radius,
        img_max_width = o.img_max_width,
        table_border_collapse = o.table_border_collapse,
        table_width = o.table_width,
        table_margin = o.table_margin,
        th_border = o.th_border,
        th_padding = o.th_padding,
        th_background_color = o.th_background_color,
        td_border = o.td_border,
        td_padding = o.td_padding,
        blockquote_border_left = o.blockquote_border_left,
        blockquote_padding_left = o.blockquote_padding_left,
        blockquote_margin_left = o.blockquote_margin_left,
        blockquote_color = o.blockquote_color,
        h1_size = o.h1_size,
        h1_color = o.h1_color,
        h1_border_bottom = o.h1_border_bottom,
        h1_margin_top = o.h1_margin_top,
        h1_margin_bottom = o.h1_margin_bottom,
        h2_size = o.h2_size,
        h2_color = o.h2_color,
        h2_margin_top = o.h2_margin_top,
        h2_margin_bottom = o.h2_margin_bottom,
        h3_size = o.h3_size,
        h3_color = o.h3_color,
        h3_margin_top = o.h3_margin_top,
        h3_margin_bottom = o.h3_margin_bottom,
    )
}

/// Full dynamic stylesheet of the preview page
///
/// Element rules plus the page box, inline versus block code, plain code
/// blocks, images and horizontal rules.
pub fn preview_css(o: &StyleOptions) -> String {
    let inline_pad = (o.code_padding - 1.0).max(0.0);
    let img_margin = (o.body_padding / 2.0).max(8.0);

    format!(
        r#"{element_rules}
body {{ width: {page_width}px; max-width: {page_width}px; min-height: {page_height}px; margin: 0 auto; color: #111827; }}
:not(pre) > code {{
    background: {code_background};
    color: {code_color};
    padding: {inline_pad}px {code_padding}px;
    border-radius: {code_border_radius}px;
}}
pre[class*="language-"] code {{
    padding: 0 !important;
    background: transparent;
    text-indent: 0;
}}
pre.language-none, pre.language-none code {{
    background: {pre_background};
    color: #e5e7eb;
    font-family: {code_font};
    border-radius: {pre_border_radius}px;
    margin: {pre_margin}px 0;
}}
img {{ display: block; margin: {img_margin}px 0; }}
hr {{
    border: 0;
    border-top: 2px solid #d1d5db;
    margin: 16px 0;
}}
"#,
        element_rules = generate_css(o),
        page_width = PAGE_WIDTH_PX,
        page_height = PAGE_HEIGHT_PX,
        code_background = o.code_background,
        code_color = o.code_color,
        inline_pad = inline_pad,
        code_padding = o.code_padding,
        code_border_radius = o.code_border_radius,
        pre_background = o.pre_background,
        code_font = o.code_font,
        pre_border_radius = o.pre_border_radius,
        pre_margin = o.pre_margin,
        img_margin = img_margin,
    )
}

/// Stylesheet sent with source-mode exports: highlight theme, then page rules
pub fn css_override(o: &StyleOptions) -> String {
    format!("{}\n{}", HIGHLIGHT_THEME_CSS, preview_css(o))
}
