//! The stitcher settings registry.
//!
//! Allowed values mirror what the Insta360 Stitcher GUI writes into its own
//! job files.

use crate::schema::{FieldDef, Literal, SchemaNode, BOOL};

use crate::schema::Literal::{Bool, Float, Int, Null, Str};

const fn one_of(allowed: &'static [Literal], default: Literal) -> SchemaNode {
    SchemaNode::Field(FieldDef::one_of(allowed, default))
}

const fn any(default: Literal) -> SchemaNode {
    SchemaNode::Field(FieldDef::any(default))
}

const fn flag(default: bool) -> SchemaNode {
    SchemaNode::Field(FieldDef::one_of(BOOL, Bool(default)))
}

/// Number of lenses on the supported camera generation.
pub const DEFAULT_LENS_COUNT: i64 = 6;

/// Root of the settings tree.
pub static SETTING_DEFINITIONS: SchemaNode = SchemaNode::Section(&[
    (
        "input",
        SchemaNode::Section(&[
            ("type", one_of(&[Str("image"), Str("video")], Str("video"))),
            ("lensCount", one_of(&[Int(DEFAULT_LENS_COUNT)], Int(DEFAULT_LENS_COUNT))),
            ("fileCount", any(Int(1))),
        ]),
    ),
    (
        "blend",
        SchemaNode::Section(&[
            ("useOpticalFlow", flag(true)),
            ("useNewOpticalFlow", flag(true)),
            (
                "mode",
                one_of(
                    &[
                        Str("pano"),
                        Str("stereo_top_left"),
                        Str("stereo_top_right"),
                        Str("stereo_separate"),
                    ],
                    Str("pano"),
                ),
            ),
            (
                "samplingLevel",
                one_of(&[Str("slow"), Str("medium"), Str("fast")], Str("fast")),
            ),
            ("useTopFixer", flag(false)),
            (
                "calibration",
                SchemaNode::Section(&[
                    ("lensVersion", any(Int(7))),
                    ("lensType", any(Int(12))),
                    ("captureTime", any(Null)),
                    ("captureTimeIndex", any(Null)),
                    ("useDefaultCircle", flag(true)),
                    ("useDefaultOffset", flag(true)),
                ]),
            ),
        ]),
    ),
    (
        "preference",
        SchemaNode::Section(&[
            (
                "encode",
                SchemaNode::Section(&[
                    ("useHardware", flag(false)),
                    ("threads", any(Int(1))),
                    (
                        "preset",
                        one_of(
                            &[
                                Str("superfast"),
                                Str("veryfast"),
                                Str("faster"),
                                Str("fast"),
                                Str("medium"),
                            ],
                            Str("superfast"),
                        ),
                    ),
                    (
                        "profile",
                        one_of(&[Str("baseline"), Str("main"), Str("high")], Str("baseline")),
                    ),
                ]),
            ),
            (
                "decode",
                SchemaNode::Section(&[
                    ("useHardware", flag(false)),
                    ("threads", any(Int(1))),
                    ("count", any(Int(1))),
                ]),
            ),
            (
                "blender",
                SchemaNode::Section(&[(
                    "type",
                    one_of(
                        &[Str("auto"), Str("cuda"), Str("opencl"), Str("cpu")],
                        Str("auto"),
                    ),
                )]),
            ),
        ]),
    ),
    (
        "gyro",
        SchemaNode::Section(&[
            ("version", one_of(&[Int(1), Int(2), Int(3)], Int(2))),
            ("type", one_of(&[Str("pro")], Str("pro"))),
            ("enable", flag(true)),
            ("filter", one_of(&[Str("akf")], Str("akf"))),
            ("timeOffset", any(Null)),
            ("filename", any(Null)),
        ]),
    ),
    (
        "gyro_calibration",
        SchemaNode::Section(&[
            ("gravity_x", any(Null)),
            ("gravity_y", any(Null)),
            ("gravity_z", any(Null)),
        ]),
    ),
    (
        "gyro_angle",
        SchemaNode::Section(&[
            ("diff_pan", any(Int(0))),
            ("diff_tilt", any(Int(0))),
            ("diff_roll", any(Int(0))),
            ("distance", any(Float(603.3333333333334))),
        ]),
    ),
    (
        "color",
        SchemaNode::Section(&[
            ("brightness", any(Null)),
            ("contrast", any(Null)),
            ("highlight", any(Null)),
            ("shadow", any(Null)),
            ("saturation", any(Null)),
            ("tempture", any(Null)),
            ("tint", any(Null)),
            ("sharpness", any(Null)),
        ]),
    ),
    (
        "depthMap",
        SchemaNode::Section(&[
            ("enable", flag(false)),
            ("path", any(Str(""))),
            ("inverse", flag(true)),
        ]),
    ),
    (
        "output",
        SchemaNode::Section(&[
            (
                "width",
                one_of(
                    &[Int(2560), Int(3840), Int(5120), Int(6400), Int(7680)],
                    Int(3840),
                ),
            ),
            (
                "height",
                one_of(
                    &[Int(1280), Int(1920), Int(2560), Int(3200), Int(3840)],
                    Int(1920),
                ),
            ),
            ("dst", any(Null)),
            ("type", one_of(&[Str("video")], Str("video"))),
        ]),
    ),
    (
        "video",
        SchemaNode::Section(&[
            (
                "fps",
                one_of(
                    &[
                        Int(1),
                        Int(5),
                        Float(23.98),
                        Int(24),
                        Int(25),
                        Float(29.97),
                        Int(30),
                        Int(60),
                    ],
                    Float(29.97),
                ),
            ),
            ("codec", one_of(&[Str("h264"), Str("h265")], Str("h264"))),
            ("bitrate", any(Int(62914560))),
            ("useInterpolation", flag(false)),
        ]),
    ),
    (
        "audio",
        SchemaNode::Section(&[
            (
                "type",
                one_of(&[Str("pano"), Str("normal"), Str("none")], Str("pano")),
            ),
            ("device", one_of(&[Str("insta360"), Str("")], Str("insta360"))),
        ]),
    ),
]);
