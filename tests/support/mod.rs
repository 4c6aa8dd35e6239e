#![allow(dead_code)]

use std::fs;
use std::path::Path;
use tempfile::TempDir;

pub const APP_PY: &str = "\
import os

from fastapi import FastAPI
from fastapi.responses import HTMLResponse

app = FastAPI()


@app.get(\"/\", response_class=HTMLResponse)
def index():
    with open(\"index.html\") as f:
        return f.read()
";

/// Writes the default context: manifest, app.py, index.html, entrypoint.sh
pub fn service_context() -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp dir");
    write_service_files(dir.path());
    dir
}

pub fn write_service_files(root: &Path) {
    fs::write(root.join("requirements.txt"), "fastapi==0.110.0\nuvicorn==0.29.0\n")
        .expect("Failed to write requirements.txt");
    fs::write(root.join("app.py"), APP_PY).expect("Failed to write app.py");
    fs::write(root.join("index.html"), "<h1>analyst</h1>\n").expect("Failed to write index.html");
    fs::write(
        root.join("entrypoint.sh"),
        "#!/bin/sh\nexec uvicorn app:app --host 0.0.0.0 --port 8000\n",
    )
    .expect("Failed to write entrypoint.sh");
}
