use numpy::PyArray2;
use pyo3::exceptions::{PyIOError, PyIndexError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};

use crate::{Beatmap, BeatmapError, HitObjectKind};

impl From<BeatmapError> for PyErr {
    fn from(err: BeatmapError) -> Self {
        match err {
            BeatmapError::Io(e) => PyIOError::new_err(format!("Failed to read beatmap: {}", e)),
            other => PyValueError::new_err(other.to_string()),
        }
    }
}

fn kind_name(kind: HitObjectKind) -> &'static str {
    match kind {
        HitObjectKind::Circle => "circle",
        HitObjectKind::Slider => "slider",
        HitObjectKind::Spinner => "spinner",
        HitObjectKind::HoldNote => "hold_note",
    }
}

/// Parses a beatmap and returns its objects and timing lines as dicts
#[pyfunction]
fn load_beatmap(py: Python, file_path: String) -> PyResult<PyObject> {
    let beatmap = Beatmap::open(&file_path)?;
    let radius = beatmap.circle_radius();

    let py_hit_objects = PyList::empty(py);
    for object in beatmap.hit_objects() {
        let obj = PyDict::new(py);
        let stacked = object.stacked_position(radius);
        let stack = object.stack().unwrap_or_default();

        obj.set_item("kind", kind_name(object.kind()))?;
        obj.set_item("time", object.time())?;
        obj.set_item("end_time", object.end_time())?;
        obj.set_item("x", object.position().x)?;
        obj.set_item("y", object.position().y)?;
        obj.set_item("stacked_x", stacked.x)?;
        obj.set_item("stacked_y", stacked.y)?;
        obj.set_item("stack_index", stack.index)?;
        obj.set_item("on_slider", stack.on_slider)?;
        obj.set_item("new_combo", object.object_type().is_new_combo())?;
        if let Some(slider) = object.as_slider() {
            obj.set_item("curve_type", slider.curve_type().as_char().to_string())?;
            obj.set_item("edge_count", slider.edge_count)?;
            obj.set_item("tick_times", slider.tick_times().to_vec())?;
        }
        py_hit_objects.append(obj)?;
    }

    let py_timing_lines = PyList::empty(py);
    for line in beatmap.timing_lines() {
        let py_line = PyDict::new(py);
        py_line.set_item("offset", line.offset)?;
        py_line.set_item("uninherited", line.is_uninherited())?;
        py_line.set_item("ms_per_beat", line.ms_per_beat())?;
        py_line.set_item("sv_mult", line.sv_mult())?;
        py_line.set_item("meter", line.meter)?;
        py_line.set_item("kiai", line.kiai)?;
        py_timing_lines.append(py_line)?;
    }

    let dict = PyDict::new(py);
    dict.set_item("hit_objects", py_hit_objects)?;
    dict.set_item("timing_lines", py_timing_lines)?;
    dict.set_item("stack_threshold", beatmap.stack_time_threshold())?;
    dict.set_item("circle_radius", radius)?;
    Ok(dict.into())
}

/// Sampled path of the slider at `index` in the object list, as an (n, 2) array
#[pyfunction]
fn slider_path<'py>(py: Python<'py>, file_path: String, index: usize) -> PyResult<&'py PyArray2<f64>> {
    let beatmap = Beatmap::open(&file_path)?;
    let object = beatmap
        .hit_objects()
        .get(index)
        .ok_or_else(|| PyIndexError::new_err(format!("No hit object at index {}", index)))?;
    let slider = object
        .as_slider()
        .ok_or_else(|| PyValueError::new_err(format!("Hit object {} is not a slider", index)))?;

    let rows: Vec<Vec<f64>> = slider.path().iter().map(|p| vec![p.x, p.y]).collect();
    PyArray2::from_vec2(py, &rows).map_err(|e| PyValueError::new_err(e.to_string()))
}

/// (time, unsnap) of every object whose practical unsnap is worth reporting
#[pyfunction]
fn unsnap_issues(file_path: String) -> PyResult<Vec<(f64, f64)>> {
    let beatmap = Beatmap::open(&file_path)?;
    let issues = beatmap
        .hit_objects()
        .iter()
        .filter_map(|object| {
            let time = object.time();
            beatmap.unsnap_issue(time).map(|unsnap| (time, unsnap))
        })
        .collect();
    Ok(issues)
}

/// Drops every cached view; needed after rewriting a file that was loaded before
#[pyfunction]
fn clear_cache() {
    crate::clear_cache();
}

#[pymodule]
fn osu_timeline(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(load_beatmap, m)?)?;
    m.add_function(wrap_pyfunction!(slider_path, m)?)?;
    m.add_function(wrap_pyfunction!(unsnap_issues, m)?)?;
    m.add_function(wrap_pyfunction!(clear_cache, m)?)?;
    Ok(())
}
