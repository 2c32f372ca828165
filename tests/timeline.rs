use approx::assert_abs_diff_eq;
use osu_timeline::{
    clear_cache, Beatmap, BeatmapError, BeatmapSource, CurveType, EngineConfig, HitObjectKind, HitSound, Sampleset,
    TimingLineKind, Vec2,
};

const FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/timeline.osu");

fn fixture() -> Beatmap {
    Beatmap::open(FIXTURE).unwrap()
}

fn assert_near(actual: Vec2, expected: Vec2) {
    assert_abs_diff_eq!(actual.x, expected.x, epsilon = 1e-6);
    assert_abs_diff_eq!(actual.y, expected.y, epsilon = 1e-6);
}

#[test]
fn test_open_reads_settings_and_sections() {
    let beatmap = fixture();
    assert_eq!(beatmap.identity(), FIXTURE);
    assert_eq!(beatmap.difficulty().slider_multiplier, 1.0);
    assert_eq!(beatmap.general().stack_leniency, 0.7);
    assert_eq!(beatmap.hit_objects().len(), 9);
    assert_eq!(beatmap.timing_lines().len(), 3);
    assert_eq!(beatmap.count(HitObjectKind::Circle), 6);
    assert_eq!(beatmap.count(HitObjectKind::Slider), 2);
    assert_eq!(beatmap.count(HitObjectKind::Spinner), 1);
    assert_eq!(beatmap.count(HitObjectKind::HoldNote), 0);
}

#[test]
fn test_hit_object_queries() {
    let beatmap = fixture();
    assert_eq!(beatmap.hit_object_at(36515.0, None).unwrap().time(), 36515.0);
    assert_eq!(beatmap.next_hit_object(36515.0, None).unwrap().time(), 36834.0);
    assert_eq!(beatmap.hit_object_at(36700.0, None).unwrap().time(), 36515.0);

    // Before the first object the first object is returned.
    assert_eq!(beatmap.hit_object_at(0.0, None).unwrap().time(), 36515.0);
    assert!(beatmap.next_hit_object(223082.0, None).is_none());
    assert!(beatmap.next_hit_object(500000.0, None).is_none());
}

#[test]
fn test_filtered_hit_object_queries() {
    let beatmap = fixture();
    let slider = beatmap.hit_object_at(60000.0, Some(HitObjectKind::Slider)).unwrap();
    assert_eq!(slider.time(), 36515.0);
    assert_eq!(slider.kind(), HitObjectKind::Slider);
    let next = beatmap.next_hit_object(60000.0, Some(HitObjectKind::Slider)).unwrap();
    assert_eq!(next.time(), 222900.0);
    assert!(beatmap.next_hit_object(222900.0, Some(HitObjectKind::Slider)).is_none());

    let spinner = beatmap.hit_object_at(100500.0, Some(HitObjectKind::Spinner)).unwrap();
    assert_eq!(spinner.end_time(), 102000.0);

    let circles: Vec<f64> = beatmap.hit_objects_of(HitObjectKind::Circle).map(|o| o.time()).collect();
    assert_eq!(circles, vec![36834.0, 56555.0, 56557.0, 74058.0, 223019.0, 223082.0]);
    assert!(beatmap.hit_object_at(1000.0, Some(HitObjectKind::HoldNote)).is_none());
}

#[test]
fn test_timing_line_queries() {
    let beatmap = fixture();
    assert_eq!(beatmap.timing_line_at(70000.0, None).unwrap().offset, 60000.0);
    let red = beatmap.timing_line_at(70000.0, Some(TimingLineKind::Uninherited)).unwrap();
    assert_eq!(red.offset, 1058.0);
    assert_eq!(red.ms_per_beat(), Some(500.0));
    assert_eq!(beatmap.next_timing_line(70000.0, None).unwrap().offset, 200000.0);
    assert!(beatmap.next_timing_line(250000.0, None).is_none());
    assert!(beatmap.next_timing_line(0.0, Some(TimingLineKind::Uninherited)).is_none());

    let green = beatmap.timing_line_at(60000.0, Some(TimingLineKind::Inherited)).unwrap();
    assert_abs_diff_eq!(green.sv_mult(), 0.5);
    assert!(green.kiai);
}

#[test]
fn test_neighbours_and_totals() {
    let beatmap = fixture();
    let objects = beatmap.hit_objects();
    assert!(beatmap.previous_of(&objects[0]).is_none());
    assert_eq!(beatmap.next_of(&objects[0]).unwrap().time(), 36834.0);
    assert_eq!(beatmap.previous_of(&objects[8]).unwrap().time(), 223019.0);
    assert!(beatmap.next_of(&objects[8]).is_none());
    for (i, object) in objects.iter().enumerate() {
        assert_eq!(object.sequence_index(), i);
    }

    assert_eq!(beatmap.bpm_range(), Some((120.0, 120.0)));
    assert_abs_diff_eq!(beatmap.play_time(), 223082.0 - 36515.0);
}

#[test]
fn test_stacking_resolution() {
    let beatmap = fixture();
    let stack_index = |time: f64| beatmap.hit_object_at(time, None).unwrap().stack().unwrap().index;
    assert_eq!(stack_index(74058.0), 0);
    assert_eq!(stack_index(222900.0), 0);
    assert_eq!(stack_index(223019.0), -1);
    assert_eq!(stack_index(223082.0), -2);

    let lowest = beatmap.hit_object_at(223082.0, None).unwrap();
    let shift = 2.0 * 0.1 * beatmap.circle_radius();
    assert_near(beatmap.stacked_position(lowest), Vec2::new(220.0 + shift, 200.0 + shift));

    let spinner = beatmap.hit_object_at(100000.0, None).unwrap();
    assert_eq!(spinner.stack(), None);
    assert_eq!(beatmap.stacked_position(spinner), spinner.position());
}

#[test]
fn test_stacking_is_idempotent() {
    let mut beatmap = fixture();
    assert_eq!(beatmap.resolve_stacking(), 0);
    assert_eq!(beatmap.hit_object_at(223082.0, None).unwrap().stack().unwrap().index, -2);
}

#[test]
fn test_unsnap_issues() {
    let beatmap = fixture();
    assert_abs_diff_eq!(beatmap.unsnap_issue(56555.0).unwrap(), 3.0, epsilon = 1e-9);
    assert_eq!(beatmap.unsnap_issue(56557.0), None);
    assert_eq!(beatmap.unsnap_issue(36515.0), None);
}

#[test]
fn test_reversed_bezier_slider() {
    let beatmap = fixture();
    let object = beatmap.hit_object_at(36515.0, None).unwrap();
    let slider = object.as_slider().unwrap();
    let head = Vec2::new(256.0, 192.0);

    assert_eq!(slider.curve_type(), CurveType::Bezier);
    assert_eq!(slider.edge_count, 2);
    assert_abs_diff_eq!(slider.slider_speed(), 0.2, epsilon = 1e-12);
    assert_abs_diff_eq!(slider.curve_duration(), 750.0, epsilon = 1e-6);
    assert_abs_diff_eq!(object.end_time(), 38015.0, epsilon = 1e-6);

    let edges = slider.edge_times();
    assert_eq!(edges.len(), 3);
    assert_abs_diff_eq!(edges[1], 37265.0, epsilon = 1e-6);
    let ticks = slider.tick_times();
    assert_eq!(ticks.len(), 2);
    assert_abs_diff_eq!(ticks[0], 37015.0, epsilon = 1e-6);
    assert_abs_diff_eq!(ticks[1], 37515.0, epsilon = 1e-6);

    assert_eq!(slider.edge_sounds, vec![HitSound::WHISTLE, HitSound::empty(), HitSound::CLAP]);
    assert_eq!(slider.edge_sets[2], (Sampleset::Soft, Sampleset::Auto));

    assert_near(slider.position_at(object.time()), head);
    // An even number of spans ends back on the head.
    assert_near(slider.end_position(), head);
    let far_end = *slider.path().last().unwrap();
    assert_near(slider.position_at(37265.0), far_end);

    let travelled: f64 = slider.path().windows(2).map(|w| w[0].distance(w[1])).sum();
    assert_abs_diff_eq!(travelled, slider.curve_length(), epsilon = 2.5);
}

#[test]
fn test_linear_slider_ends_at_its_last_node() {
    let beatmap = fixture();
    let slider = beatmap.hit_object_at(222900.0, None).unwrap().as_slider().unwrap();
    assert_eq!(slider.curve_type(), CurveType::Linear);
    assert_near(slider.position_at(222900.0), Vec2::new(200.0, 200.0));
    assert_near(slider.position_at(222950.0), Vec2::new(210.0, 200.0));
    assert_near(slider.end_position(), Vec2::new(220.0, 200.0));
    assert_near(slider.tail_anchor(), Vec2::new(220.0, 200.0));
    assert!(slider.tick_times().is_empty());
}

#[test]
fn test_sample_spacing_from_config() {
    let source = BeatmapSource::read(FIXTURE).unwrap();
    let config: EngineConfig = serde_json::from_str(r#"{ "sample_spacing": 10.0 }"#).unwrap();
    let coarse = Beatmap::from_source("timeline-coarse".to_string(), &source, config).unwrap();
    let fine = fixture();

    let path_len = |beatmap: &Beatmap| beatmap.hit_objects()[0].as_slider().unwrap().path().len();
    assert!(path_len(&coarse) < path_len(&fine));
}

#[test]
fn test_queries_survive_cache_clear() {
    let beatmap = fixture();
    assert_eq!(beatmap.count(HitObjectKind::Slider), 2);
    clear_cache();
    assert_eq!(beatmap.count(HitObjectKind::Slider), 2);
    let circle = beatmap.hit_object_at(36515.0, Some(HitObjectKind::Circle)).unwrap();
    assert_eq!(circle.time(), 36834.0);
    let next = beatmap.next_hit_object(36834.0, Some(HitObjectKind::Circle)).unwrap();
    assert_eq!(next.time(), 56555.0);
}

#[test]
fn test_errors_name_the_offending_line() {
    let text = "osu file format v14\n\
                [TimingPoints]\n\
                0,500,4,2,0,100,1,0\n\
                [HitObjects]\n\
                256,192,1000,1,0\n\
                256,192,oops,1,0\n";
    match Beatmap::parse(text) {
        Err(BeatmapError::Line { section, index, source }) => {
            assert_eq!(section, "HitObjects");
            assert_eq!(index, 1);
            assert!(matches!(*source, BeatmapError::InvalidNumber { field: "time", .. }));
        }
        other => panic!("expected a line error, got {:?}", other),
    }
}

#[test]
fn test_slider_without_timing_is_rejected() {
    let text = "osu file format v14\n[HitObjects]\n256,192,1000,2,0,L|300:192,1,44\n";
    let err = Beatmap::parse(text).unwrap_err();
    assert!(matches!(
        err,
        BeatmapError::Line { ref source, .. } if matches!(**source, BeatmapError::MissingTiming { .. })
    ));
}

#[test]
fn test_missing_file_is_io_error() {
    let err = Beatmap::open("/nonexistent/beatmap.osu").unwrap_err();
    assert!(matches!(err, BeatmapError::Io(_)));
}

#[test]
fn test_concurrent_queries_agree() {
    let source = BeatmapSource::read(FIXTURE).unwrap();
    let beatmap = Beatmap::from_source("timeline-threads".to_string(), &source, EngineConfig::default()).unwrap();
    let kinds = [HitObjectKind::Circle, HitObjectKind::Slider, HitObjectKind::Spinner];

    let results: Vec<Vec<(usize, Option<f64>, Option<f64>)>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(|| {
                    kinds
                        .iter()
                        .map(|&kind| {
                            (
                                beatmap.count(kind),
                                beatmap.hit_object_at(60000.0, Some(kind)).map(|o| o.time()),
                                beatmap.next_hit_object(60000.0, Some(kind)).map(|o| o.time()),
                            )
                        })
                        .collect()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let expected = vec![
        (6, Some(56557.0), Some(74058.0)),
        (2, Some(36515.0), Some(222900.0)),
        (1, Some(100000.0), None),
    ];
    for result in results {
        assert_eq!(result, expected);
    }
}

#[test]
fn test_extreme_green_line_builds() {
    let beatmap = Beatmap::new(
        &["0,500,4,2,0,100,1,0", "500,-1e12,4,2,0,100,0,0"],
        &["100,100,1000,2,0,L|200:100,1,100"],
        Default::default(),
        Default::default(),
    )
    .unwrap();
    let slider = beatmap.hit_objects()[0].as_slider().unwrap();
    // Slowest accepted velocity: 0.1 x 1.4 x 100 / 500 px per ms.
    assert_abs_diff_eq!(slider.slider_speed(), 0.028, epsilon = 1e-12);
    assert!(slider.tick_times().len() < 10);
    assert_near(slider.end_position(), Vec2::new(200.0, 100.0));
}
