use super::{Filter, FilterEngine};

pub(super) fn register_all(engine: &mut FilterEngine) {
    let presets: [(&str, Vec<Filter>); 8] = [
        (
            "vintage",
            vec![
                Filter::new("sepia", 0.5),
                Filter::new("contrast", 0.1),
                Filter::new("vignette", 0.3),
            ],
        ),
        (
            "noir",
            vec![Filter::new("grayscale", 1.0), Filter::new("contrast", 0.3)],
        ),
        (
            "warm",
            vec![Filter::new("temperature", 0.3), Filter::new("saturation", 0.1)],
        ),
        ("cool", vec![Filter::new("temperature", -0.3)]),
        (
            "dramatic",
            vec![
                Filter::new("contrast", 0.4),
                Filter::new("saturation", -0.2),
                Filter::new("vignette", 0.4),
            ],
        ),
        (
            "fade",
            vec![
                Filter::new("contrast", -0.2),
                Filter::new("brightness", 0.1),
                Filter::new("saturation", -0.3),
            ],
        ),
        (
            "vivid",
            vec![
                Filter::new("vibrance", 0.5),
                Filter::new("saturation", 0.2),
                Filter::new("contrast", 0.1),
            ],
        ),
        (
            "film",
            vec![
                Filter::new("grain", 0.3),
                Filter::new("contrast", 0.1),
                Filter::new("saturation", -0.1),
            ],
        ),
    ];

    for (name, chain) in presets {
        engine.register_preset(name, chain);
    }
}
