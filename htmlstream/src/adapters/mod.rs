pub mod lol_html;
