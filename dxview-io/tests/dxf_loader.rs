use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};
use std::path::PathBuf;

use dxview_core::document::{Document, DimensionKind, EntityKind, HatchEdge};
use dxview_io::{DocumentLoader, DxfError, DxfFacade, IoError, parse_document};

fn load_fixture(name: &str) -> Document {
    let mut fixtures = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    fixtures.push("tests/data");
    fixtures.push(name);

    let loader = DxfFacade::new();
    loader.load(&fixtures).expect("读取 DXF 失败")
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn load_basic_entities_keeps_every_entity() {
    let doc = load_fixture("basic_entities.dxf");
    let types: Vec<&str> = doc.entities().iter().map(|entity| entity.type_name()).collect();
    assert_eq!(
        types,
        vec![
            "LINE",
            "CIRCLE",
            "ARC",
            "LWPOLYLINE",
            "TEXT",
            "MTEXT",
            "INSERT",
            "POINT",
            "SOLID",
            "3DFACE",
            "VIEWPORT",
            "POLYLINE",
            "LINE",
        ]
    );
    assert_eq!(doc.version(), Some("AC1015"));
    assert!(approx(doc.linetype_scale(), 2.0));
    assert_eq!(doc.layers().len(), 2);
    assert_eq!(doc.linetypes().len(), 2);
}

#[test]
fn entity_common_properties_are_parsed() {
    let doc = load_fixture("basic_entities.dxf");
    let entities = doc.entities();

    let line = &entities[0];
    assert_eq!(line.common.layer, "WALLS");
    assert_eq!(line.common.handle.as_deref(), Some("2A"));
    assert_eq!(line.common.owner_handle.as_deref(), Some("1F"));
    assert!(line.common.is_visible);

    let circle = &entities[1];
    assert_eq!(circle.common.color_index, Some(3));

    let hidden = entities.last().expect("缺少最后一个实体");
    assert!(!hidden.common.is_visible);
    assert_eq!(hidden.common.linetype.as_deref(), Some("BYBLOCK"));
    assert_eq!(hidden.common.linetype_scale, Some(0.5));
    assert_eq!(hidden.common.extended_data, vec!["hidden-note".to_string()]);
}

#[test]
fn arcs_and_text_angles_are_radians() {
    let doc = load_fixture("basic_entities.dxf");
    let EntityKind::Arc(arc) = &doc.entities()[2].kind else {
        panic!("第三个实体应为 ARC");
    };
    assert!(approx(arc.start_angle, 0.0));
    assert!(approx(arc.end_angle, PI));

    let EntityKind::Text(text) = &doc.entities()[4].kind else {
        panic!("第五个实体应为 TEXT");
    };
    assert_eq!(text.content, "Hello");
    assert!(approx(text.rotation, FRAC_PI_4));
    assert_eq!(text.horizontal_align, 1);
    let alignment = text.alignment_point.expect("缺少对齐点");
    assert!(approx(alignment.x(), 3.0));
}

#[test]
fn lwpolyline_keeps_bulge_and_closed_flag() {
    let doc = load_fixture("basic_entities.dxf");
    let EntityKind::Polyline(polyline) = &doc.entities()[3].kind else {
        panic!("第四个实体应为 LWPOLYLINE");
    };
    assert!(polyline.is_closed);
    assert!(polyline.is_lightweight);
    assert_eq!(polyline.vertices.len(), 3);
    assert!(approx(polyline.vertices[0].bulge, 1.0));
    assert!(approx(polyline.vertices[1].bulge, 0.0));
    assert!(approx(polyline.vertices[2].position.y(), 5.0));
}

#[test]
fn legacy_polyline_collects_vertices_until_seqend() {
    let doc = load_fixture("basic_entities.dxf");
    let EntityKind::Polyline(polyline) = &doc.entities()[11].kind else {
        panic!("应为旧式 POLYLINE");
    };
    assert!(!polyline.is_lightweight);
    assert!(!polyline.is_closed);
    assert_eq!(polyline.vertices.len(), 3);
    assert!(approx(polyline.vertices[0].bulge, 0.5));
}

#[test]
fn mtext_concatenates_raw_fragments() {
    let doc = load_fixture("basic_entities.dxf");
    let EntityKind::MText(mtext) = &doc.entities()[5].kind else {
        panic!("第六个实体应为 MTEXT");
    };
    assert_eq!(mtext.content, "\\C1;Red part and\\Pnext line");
    assert_eq!(mtext.attachment_point, 5);
    assert_eq!(mtext.reference_width, Some(20.0));
}

#[test]
fn insert_collects_attributes() {
    let doc = load_fixture("basic_entities.dxf");
    let EntityKind::Insert(insert) = &doc.entities()[6].kind else {
        panic!("第七个实体应为 INSERT");
    };
    assert_eq!(insert.block_name, "DOOR");
    assert!(approx(insert.scale.x(), 2.0));
    assert!(approx(insert.rotation, FRAC_PI_2));
    assert_eq!(insert.attributes.len(), 1);
    assert_eq!(insert.attributes[0].tag, "TAG");
    assert_eq!(insert.attributes[0].text, "D-42");
    // SEQEND 被 INSERT 吞掉，下一个实体是 POINT
    assert_eq!(doc.entities()[7].type_name(), "POINT");
}

#[test]
fn solid_and_face_corners() {
    let doc = load_fixture("basic_entities.dxf");
    let EntityKind::Solid(solid) = &doc.entities()[8].kind else {
        panic!("应为 SOLID");
    };
    // 缺省的第四点与第三点重合
    assert_eq!(solid.corners[3], solid.corners[2]);

    let EntityKind::Face(face) = &doc.entities()[9].kind else {
        panic!("应为 3DFACE");
    };
    assert!(approx(face.vertices[0].z(), 1.0));
    assert_eq!(face.invisible_edges, [false, false, true, false]);
}

#[test]
fn blocks_keep_anonymous_and_named_definitions() {
    let doc = load_fixture("basic_entities.dxf");
    assert_eq!(doc.block_count(), 2);
    assert!(doc.block("*Model_Space").is_some());

    let door = doc.block("DOOR").expect("缺少 DOOR 块");
    assert!(approx(door.base_point.x(), 1.0));
    assert_eq!(door.entities.len(), 3);
    assert_eq!(door.entities[0].common.color_index, Some(0));
    let EntityKind::Attdef(attdef) = &door.entities[2].kind else {
        panic!("DOOR 块的第三个实体应为 ATTDEF");
    };
    assert_eq!(attdef.tag, "TAG");
    assert_eq!(attdef.prompt.as_deref(), Some("Door number"));
    assert_eq!(attdef.default_text, "D-01");
}

#[test]
fn hatch_polyline_and_edge_loops() {
    let doc = load_fixture("hatch_boundaries.dxf");
    assert_eq!(doc.entities().len(), 2);

    let EntityKind::Hatch(hatch) = &doc.entities()[0].kind else {
        panic!("应为 HATCH");
    };
    assert_eq!(hatch.pattern_name, "ANSI31");
    assert!(!hatch.is_solid);
    assert_eq!(hatch.loops.len(), 2);

    let outer = &hatch.loops[0];
    assert!(outer.is_polyline);
    assert_eq!(outer.edges.len(), 4);
    assert!(matches!(outer.edges[3], HatchEdge::PolylineSegment { .. }));

    let inner = &hatch.loops[1];
    assert!(!inner.is_polyline);
    assert_eq!(inner.edges.len(), 2);
    assert!(matches!(inner.edges[0], HatchEdge::Line { .. }));
    match &inner.edges[1] {
        HatchEdge::Arc {
            radius,
            end_angle,
            is_counter_clockwise,
            ..
        } => {
            assert!(approx(*radius, 1.0));
            assert!(approx(*end_angle, PI));
            assert!(*is_counter_clockwise);
        }
        other => panic!("意外的边类型：{other:?}"),
    }
    assert_eq!(inner.boundary_handles, vec!["7F".to_string()]);

    assert_eq!(hatch.pattern_lines.len(), 1);
    let line = &hatch.pattern_lines[0];
    assert!(approx(line.angle, FRAC_PI_4));
    assert!(line.dashes.is_empty());
    assert!((line.offset.y() - 0.0883883476).abs() < 1e-9);
}

#[test]
fn solid_hatch_with_ellipse_and_spline_edges() {
    let doc = load_fixture("hatch_boundaries.dxf");
    let EntityKind::Hatch(hatch) = &doc.entities()[1].kind else {
        panic!("应为 HATCH");
    };
    assert!(hatch.is_solid);
    assert_eq!(hatch.loops.len(), 1);
    let edges = &hatch.loops[0].edges;
    assert_eq!(edges.len(), 2);
    assert!(matches!(edges[0], HatchEdge::Ellipse { .. }));
    match &edges[1] {
        HatchEdge::Spline {
            degree,
            knot_values,
            control_points,
            ..
        } => {
            assert_eq!(*degree, 3);
            assert_eq!(knot_values.len(), 8);
            assert_eq!(control_points.len(), 4);
        }
        other => panic!("意外的边类型：{other:?}"),
    }
}

#[test]
fn dimensions_splines_and_leaders() {
    let doc = load_fixture("annotations.dxf");
    let entities = doc.entities();
    assert_eq!(entities.len(), 6);

    let EntityKind::Dimension(linear) = &entities[0].kind else {
        panic!("应为 DIMENSION");
    };
    assert_eq!(linear.kind, DimensionKind::Linear);
    assert_eq!(linear.block_name.as_deref(), Some("*D1"));
    assert_eq!(linear.text.as_deref(), Some("<> mm"));
    assert!(linear.first_point.is_some() && linear.second_point.is_some());

    let EntityKind::Dimension(radius) = &entities[1].kind else {
        panic!("应为 DIMENSION");
    };
    assert_eq!(radius.kind, DimensionKind::Radius);
    assert_eq!(radius.measurement, Some(3.5));

    let EntityKind::Spline(spline) = &entities[2].kind else {
        panic!("应为 SPLINE");
    };
    assert_eq!(spline.degree, 3);
    assert_eq!(spline.knot_values.len(), 8);
    assert_eq!(spline.control_points.len(), 4);
    assert!(!spline.is_closed);

    let EntityKind::Ellipse(ellipse) = &entities[3].kind else {
        panic!("应为 ELLIPSE");
    };
    assert!(approx(ellipse.ratio, 0.5));
    assert!(approx(ellipse.end_parameter, PI));

    let EntityKind::Leader(leader) = &entities[4].kind else {
        panic!("应为 LEADER");
    };
    assert_eq!(leader.vertices.len(), 3);
    assert!(leader.has_arrowhead);

    let EntityKind::MLeader(mleader) = &entities[5].kind else {
        panic!("应为 MULTILEADER");
    };
    assert_eq!(mleader.leader_lines.len(), 1);
    let line = &mleader.leader_lines[0];
    assert_eq!(line.len(), 3);
    assert!(approx(line[2].x(), 5.5));
    assert_eq!(mleader.text.as_deref(), Some("Note text"));
    assert_eq!(mleader.text_height, Some(0.18));
    assert!(approx(mleader.text_location.expect("缺少文字位置").x(), 6.2));
}

#[test]
fn parsed_document_serializes_to_json() {
    let doc = load_fixture("basic_entities.dxf");
    let json = serde_json::to_value(doc.entities()).expect("序列化失败");
    let first = &json[0];
    assert_eq!(first["common"]["layer"], "WALLS");
    assert_eq!(first["kind"]["kind"], "line");
}

#[test]
fn zero_entity_document_parses() {
    let doc = parse_document("0\nSECTION\n2\nENTITIES\n0\nENDSEC\n0\nEOF\n").expect("解析失败");
    assert!(doc.entities().is_empty());
    assert!(doc.bounds().is_none());
}

#[test]
fn unknown_entity_codes_are_ignored() {
    let source = "0\nSECTION\n2\nENTITIES\n\
                  0\nCIRCLE\n8\n0\n999\ncomment\n10\n1\n20\n1\n40\n2\n1071\n5\n\
                  0\nENDSEC\n0\nEOF\n";
    let doc = parse_document(source).expect("解析失败");
    let EntityKind::Circle(circle) = &doc.entities()[0].kind else {
        panic!("应为 CIRCLE");
    };
    assert!(approx(circle.radius, 2.0));
}

#[test]
fn trace_keeps_source_type_name() {
    let source = "0\nSECTION\n2\nENTITIES\n\
                  0\nTRACE\n8\n0\n10\n0\n20\n0\n11\n1\n21\n0\n12\n0\n22\n1\n13\n1\n23\n1\n\
                  0\nSOLID\n8\n0\n10\n0\n20\n0\n11\n1\n21\n0\n12\n0\n22\n1\n\
                  0\nENDSEC\n0\nEOF\n";
    let doc = parse_document(source).expect("解析失败");
    let types: Vec<&str> = doc.entities().iter().map(|entity| entity.type_name()).collect();
    assert_eq!(types, vec!["TRACE", "SOLID"]);
    let EntityKind::Solid(trace) = &doc.entities()[0].kind else {
        panic!("TRACE 应解析为四边形");
    };
    assert!(trace.is_trace);
    assert!(approx(trace.corners[3].x(), 1.0));
}

#[test]
fn insert_z_scale_is_consumed() {
    let source = "0\nSECTION\n2\nENTITIES\n\
                  0\nINSERT\n8\n0\n2\nBOX\n10\n1\n20\n2\n41\n2\n42\n3\n43\n4\n\
                  0\nENDSEC\n0\nEOF\n";
    let doc = parse_document(source).expect("解析失败");
    let EntityKind::Insert(insert) = &doc.entities()[0].kind else {
        panic!("应为 INSERT");
    };
    assert!(approx(insert.scale.x(), 2.0));
    assert!(approx(insert.scale.y(), 3.0));
    assert!(doc.entities()[0].common.extended_data.is_empty());
}

#[test]
fn embedded_object_is_skipped() {
    let source = "0\nSECTION\n2\nENTITIES\n\
                  0\nMTEXT\n8\n0\n10\n0\n20\n0\n40\n1\n1\nabc\n\
                  101\nEmbedded Object\n70\n1\n10\n1\n11\n2\n\
                  0\nPOINT\n10\n3\n20\n4\n\
                  0\nENDSEC\n0\nEOF\n";
    let doc = parse_document(source).expect("解析失败");
    assert_eq!(doc.entities().len(), 2);
    assert_eq!(doc.entities()[1].type_name(), "POINT");
}

#[test]
fn malformed_point_is_reported_with_entity_context() {
    let source = "0\nSECTION\n2\nENTITIES\n0\nLINE\n10\n0\n30\n0\n0\nENDSEC\n0\nEOF\n";
    let err = parse_document(source).expect_err("应当失败");
    match &err {
        DxfError::Entity { kind, line, .. } => {
            assert_eq!(kind, "LINE");
            assert_eq!(*line, 5);
        }
        other => panic!("意外的错误：{other:?}"),
    }
    assert!(matches!(
        err.root_cause(),
        DxfError::MalformedPoint {
            expected: 20,
            actual: 30,
            ..
        }
    ));
}

#[test]
fn entity_missing_required_field_is_skipped() {
    let source = "0\nSECTION\n2\nENTITIES\n\
                  0\nCIRCLE\n8\n0\n10\n1\n20\n1\n\
                  0\nPOINT\n10\n3\n20\n4\n\
                  0\nENDSEC\n0\nEOF\n";
    let doc = parse_document(source).expect("解析失败");
    assert_eq!(doc.entities().len(), 1);
    assert_eq!(doc.entities()[0].type_name(), "POINT");
}

#[test]
fn polyface_polyline_is_kept_as_unknown() {
    let source = "0\nSECTION\n2\nENTITIES\n\
                  0\nPOLYLINE\n8\n0\n66\n1\n70\n64\n\
                  0\nVERTEX\n10\n0\n20\n0\n70\n192\n\
                  0\nSEQEND\n\
                  0\nENDSEC\n0\nEOF\n";
    let doc = parse_document(source).expect("解析失败");
    assert_eq!(doc.entities().len(), 1);
    assert!(matches!(
        &doc.entities()[0].kind,
        EntityKind::Unknown { type_name } if type_name == "POLYLINE"
    ));
}

#[test]
fn missing_file_is_read_error() {
    let loader = DxfFacade::new();
    let err = loader
        .load(&PathBuf::from("/definitely/not/here.dxf"))
        .expect_err("应当失败");
    assert!(matches!(err, IoError::ReadError { .. }));
}
