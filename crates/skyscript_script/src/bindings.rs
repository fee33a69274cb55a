//! The `XPlane` global.
//!
//! Layout:
//! - `XPlane.dataref`  - find, type queries, typed getters and setters
//! - `XPlane.scenery`  - objects, terrain probes, magnetic variation
//! - `XPlane.instance` - placed object instances
//! - `XPlane.graphics` - local/world coordinate conversion
//!
//! Every function takes its arguments untyped and checks them by hand.
//! Nothing here throws: a failed call returns the sentinel documented for
//! that function (`false`, `null`, `0`, `""` or a probe miss).

use crate::ffi::ScriptHandle;
use rquickjs::prelude::Rest;
use rquickjs::{Array, Ctx, Function, IntoJs, Object, Value};
use skyscript_core::dataref::marshal::{self, script_index, script_int};
use skyscript_core::scenery::{PROBE_ERROR, PROBE_INVALID_HANDLE};
use skyscript_core::{
    Bridge, BridgeError, DataTypes, Handle, Host, InstancePosition, LocalCoordinates, ObjectHandle,
    ProbeType, ResourceKind, Span, TerrainProbeResult, WorldCoordinates,
};
use std::cell::RefCell;
use std::rc::Rc;

/// The bridge as shared between every bound function of one context.
pub type SharedBridge<H> = Rc<RefCell<Bridge<H>>>;

/// Value returned when a call fails.
#[derive(Debug, Clone, Copy)]
enum Sentinel {
    False,
    Null,
    Zero,
    EmptyString,
    ProbeError,
}

impl Sentinel {
    fn value<'js>(self, ctx: &Ctx<'js>) -> Value<'js> {
        match self {
            Sentinel::False => Value::new_bool(ctx.clone(), false),
            Sentinel::Null => Value::new_null(ctx.clone()),
            Sentinel::Zero => Value::new_int(ctx.clone(), 0),
            Sentinel::EmptyString => ""
                .into_js(ctx)
                .unwrap_or_else(|_| Value::new_null(ctx.clone())),
            Sentinel::ProbeError => {
                probe_miss(ctx, PROBE_ERROR).unwrap_or_else(|_| Value::new_null(ctx.clone()))
            }
        }
    }
}

/// Why a bound function fell back to its sentinel.
enum Failure {
    /// Arguments were malformed; the bridge never saw the call.
    Rejected(BridgeError),
    /// Building the return value failed inside the engine.
    Engine(rquickjs::Error),
}

impl From<BridgeError> for Failure {
    fn from(err: BridgeError) -> Self {
        Failure::Rejected(err)
    }
}

impl From<rquickjs::Error> for Failure {
    fn from(err: rquickjs::Error) -> Self {
        Failure::Engine(err)
    }
}

type CallResult<'js> = Result<Value<'js>, Failure>;

/// Positional script arguments. `undefined` and `null` count as absent.
struct Args<'a, 'js> {
    values: &'a [Value<'js>],
}

impl<'a, 'js> Args<'a, 'js> {
    fn get(&self, index: usize) -> Option<&'a Value<'js>> {
        self.values
            .get(index)
            .filter(|value| !value.is_undefined() && !value.is_null())
    }

    fn string(&self, index: usize, name: &'static str) -> Result<String, BridgeError> {
        self.get(index)
            .and_then(|value| value.as_string())
            .and_then(|text| text.to_string().ok())
            .ok_or_else(|| expected(name, "a string"))
    }

    fn number(&self, index: usize, name: &'static str) -> Result<f64, BridgeError> {
        self.get(index)
            .and_then(|value| value.as_number())
            .ok_or_else(|| expected(name, "a number"))
    }

    fn opt_number(&self, index: usize, name: &'static str) -> Result<Option<f64>, BridgeError> {
        match self.get(index) {
            None => Ok(None),
            Some(value) => value
                .as_number()
                .map(Some)
                .ok_or_else(|| expected(name, "a number")),
        }
    }

    /// Optional non-negative index, defaulting to 0.
    fn offset(&self, index: usize) -> Result<usize, BridgeError> {
        self.opt_number(index, "offset")?
            .map_or(Ok(0), |value| script_index("offset", value))
    }

    fn handle<K: ResourceKind>(
        &self,
        index: usize,
        name: &'static str,
    ) -> Result<Handle<K>, BridgeError> {
        let value = self.number(index, name)?;
        ScriptHandle::from_number(value)
            .map(Handle::from)
            .ok_or_else(|| expected(name, "a handle"))
    }

    fn array(&self, index: usize, name: &'static str) -> Result<Option<Array<'js>>, BridgeError> {
        match self.get(index) {
            None => Ok(None),
            Some(value) => value
                .as_array()
                .cloned()
                .map(Some)
                .ok_or_else(|| expected(name, "an array")),
        }
    }

    /// Array of numbers. A missing array is empty.
    fn numbers(&self, index: usize, name: &'static str) -> Result<Vec<f64>, BridgeError> {
        let Some(array) = self.array(index, name)? else {
            return Ok(Vec::new());
        };
        array
            .iter::<Value>()
            .map(|item| {
                item.ok()
                    .and_then(|value| value.as_number())
                    .ok_or_else(|| expected(name, "an array of numbers"))
            })
            .collect()
    }

    /// Array of strings. A missing array is empty.
    fn strings(&self, index: usize, name: &'static str) -> Result<Vec<String>, BridgeError> {
        let Some(array) = self.array(index, name)? else {
            return Ok(Vec::new());
        };
        array
            .iter::<Value>()
            .map(|item| {
                item.ok()
                    .and_then(|value| value.as_string().and_then(|text| text.to_string().ok()))
                    .ok_or_else(|| expected(name, "an array of strings"))
            })
            .collect()
    }

    /// A string (written as its UTF-8 bytes) or an array of byte values.
    fn bytes(&self, index: usize, name: &'static str) -> Result<Vec<u8>, BridgeError> {
        match self.get(index) {
            Some(value) if value.is_string() => Ok(self.string(index, name)?.into_bytes()),
            Some(value) if value.is_array() => self
                .numbers(index, name)?
                .into_iter()
                .map(|number| {
                    script_int(number)
                        .ok()
                        .and_then(|int| u8::try_from(int).ok())
                        .ok_or_else(|| expected(name, "bytes in 0..=255"))
                })
                .collect(),
            _ => Err(expected(name, "a string or an array of bytes")),
        }
    }

    fn object(&self, index: usize, name: &'static str) -> Result<Object<'js>, BridgeError> {
        self.get(index)
            .and_then(|value| value.as_object())
            .cloned()
            .ok_or_else(|| expected(name, "an object"))
    }
}

fn expected(name: &'static str, what: &str) -> BridgeError {
    BridgeError::InvalidArgument {
        name,
        reason: format!("expected {what}"),
    }
}

/// Register `op` (e.g. `"dataref.getInt"`) on `namespace` under its short name.
fn bind<'js, H, F>(
    ctx: &Ctx<'js>,
    namespace: &Object<'js>,
    bridge: &SharedBridge<H>,
    op: &'static str,
    sentinel: Sentinel,
    call: F,
) -> rquickjs::Result<()>
where
    H: Host + 'static,
    F: Fn(&Ctx<'js>, &mut Bridge<H>, &Args<'_, 'js>) -> CallResult<'js> + 'js,
{
    let name = op.rsplit_once('.').map_or(op, |(_, name)| name);
    let bridge = Rc::clone(bridge);
    let function = Function::new(
        ctx.clone(),
        move |ctx: Ctx<'js>, Rest(values): Rest<Value<'js>>| -> Value<'js> {
            let Ok(mut bridge) = bridge.try_borrow_mut() else {
                tracing::warn!(op, "bridge is busy, call ignored");
                return sentinel.value(&ctx);
            };
            match call(&ctx, &mut *bridge, &Args { values: &values }) {
                Ok(value) => value,
                Err(Failure::Rejected(err)) => {
                    bridge.reject(op, err);
                    sentinel.value(&ctx)
                }
                Err(Failure::Engine(err)) => {
                    tracing::warn!(op, error = %err, "failed to build script value");
                    sentinel.value(&ctx)
                }
            }
        },
    )?;
    namespace.set(name, function)
}

/// Install `XPlane` on the global object of `ctx`.
pub fn install_bridge<'js, H: Host + 'static>(
    ctx: &Ctx<'js>,
    bridge: &SharedBridge<H>,
) -> rquickjs::Result<()> {
    let xplane = Object::new(ctx.clone())?;
    xplane.set("dataref", dataref_namespace(ctx, bridge)?)?;
    xplane.set("scenery", scenery_namespace(ctx, bridge)?)?;
    xplane.set("instance", instance_namespace(ctx, bridge)?)?;
    xplane.set("graphics", graphics_namespace(ctx, bridge)?)?;
    ctx.globals().set("XPlane", xplane)?;
    tracing::debug!("bound XPlane API (dataref, scenery, instance, graphics)");
    Ok(())
}

// ============================================================================
// XPlane.dataref
// ============================================================================

fn dataref_namespace<'js, H: Host + 'static>(
    ctx: &Ctx<'js>,
    bridge: &SharedBridge<H>,
) -> rquickjs::Result<Object<'js>> {
    let ns = Object::new(ctx.clone())?;

    bind(ctx, &ns, bridge, "dataref.find", Sentinel::Null, |ctx, bridge, args| {
        let path = args.string(0, "path")?;
        Ok(match bridge.find(&path) {
            Ok(()) => Value::new_bool(ctx.clone(), true),
            Err(_) => Value::new_null(ctx.clone()),
        })
    })?;

    bind(ctx, &ns, bridge, "dataref.canWrite", Sentinel::False, |ctx, bridge, args| {
        let path = args.string(0, "path")?;
        let writable = bridge.can_write(&path).unwrap_or(false);
        Ok(Value::new_bool(ctx.clone(), writable))
    })?;

    bind(ctx, &ns, bridge, "dataref.getTypes", Sentinel::Null, |ctx, bridge, args| {
        let path = args.string(0, "path")?;
        match bridge.get_types(&path) {
            Ok(types) => Ok(types_object(ctx, types)?),
            Err(_) => Ok(Value::new_null(ctx.clone())),
        }
    })?;

    // Scalar getters

    bind(ctx, &ns, bridge, "dataref.getInt", Sentinel::Zero, |ctx, bridge, args| {
        let path = args.string(0, "path")?;
        Ok(Value::new_int(ctx.clone(), bridge.get_int(&path).unwrap_or(0)))
    })?;

    bind(ctx, &ns, bridge, "dataref.getFloat", Sentinel::Zero, |ctx, bridge, args| {
        let path = args.string(0, "path")?;
        let value = bridge.get_float(&path).map_or(0.0, f64::from);
        Ok(Value::new_number(ctx.clone(), value))
    })?;

    bind(ctx, &ns, bridge, "dataref.getDouble", Sentinel::Zero, |ctx, bridge, args| {
        let path = args.string(0, "path")?;
        Ok(Value::new_number(ctx.clone(), bridge.get_double(&path).unwrap_or(0.0)))
    })?;

    // Array and byte getters

    bind(ctx, &ns, bridge, "dataref.getIntArray", Sentinel::Null, |ctx, bridge, args| {
        let path = args.string(0, "path")?;
        let span = Span::from_script(args.opt_number(1, "offset")?, args.opt_number(2, "count")?)?;
        match bridge.get_int_array(&path, span) {
            Ok(values) => Ok(values.into_js(ctx)?),
            Err(_) => Ok(Value::new_null(ctx.clone())),
        }
    })?;

    bind(ctx, &ns, bridge, "dataref.getFloatArray", Sentinel::Null, |ctx, bridge, args| {
        let path = args.string(0, "path")?;
        let span = Span::from_script(args.opt_number(1, "offset")?, args.opt_number(2, "count")?)?;
        match bridge.get_float_array(&path, span) {
            Ok(values) => {
                let values: Vec<f64> = values.into_iter().map(f64::from).collect();
                Ok(values.into_js(ctx)?)
            }
            Err(_) => Ok(Value::new_null(ctx.clone())),
        }
    })?;

    bind(ctx, &ns, bridge, "dataref.getData", Sentinel::EmptyString, |ctx, bridge, args| {
        let path = args.string(0, "path")?;
        let span = Span::from_script(
            args.opt_number(1, "offset")?,
            args.opt_number(2, "maxBytes")?,
        )?;
        let text = bridge
            .get_data(&path, span)
            .map(|bytes| marshal::bytes_to_text(&bytes))
            .unwrap_or_default();
        Ok(text.into_js(ctx)?)
    })?;

    // Scalar setters

    bind(ctx, &ns, bridge, "dataref.setInt", Sentinel::False, |ctx, bridge, args| {
        let path = args.string(0, "path")?;
        let value = script_int(args.number(1, "value")?)?;
        Ok(Value::new_bool(ctx.clone(), bridge.set_int(&path, value).is_ok()))
    })?;

    bind(ctx, &ns, bridge, "dataref.setFloat", Sentinel::False, |ctx, bridge, args| {
        let path = args.string(0, "path")?;
        let value = args.number(1, "value")? as f32;
        Ok(Value::new_bool(ctx.clone(), bridge.set_float(&path, value).is_ok()))
    })?;

    bind(ctx, &ns, bridge, "dataref.setDouble", Sentinel::False, |ctx, bridge, args| {
        let path = args.string(0, "path")?;
        let value = args.number(1, "value")?;
        Ok(Value::new_bool(ctx.clone(), bridge.set_double(&path, value).is_ok()))
    })?;

    // Array and byte setters

    bind(ctx, &ns, bridge, "dataref.setIntArray", Sentinel::False, |ctx, bridge, args| {
        let path = args.string(0, "path")?;
        let values = args
            .numbers(1, "values")?
            .into_iter()
            .map(script_int)
            .collect::<Result<Vec<_>, _>>()?;
        let offset = args.offset(2)?;
        let ok = bridge.set_int_array(&path, &values, offset).is_ok();
        Ok(Value::new_bool(ctx.clone(), ok))
    })?;

    bind(ctx, &ns, bridge, "dataref.setFloatArray", Sentinel::False, |ctx, bridge, args| {
        let path = args.string(0, "path")?;
        let values: Vec<f32> = args
            .numbers(1, "values")?
            .into_iter()
            .map(|value| value as f32)
            .collect();
        let offset = args.offset(2)?;
        let ok = bridge.set_float_array(&path, &values, offset).is_ok();
        Ok(Value::new_bool(ctx.clone(), ok))
    })?;

    bind(ctx, &ns, bridge, "dataref.setData", Sentinel::False, |ctx, bridge, args| {
        let path = args.string(0, "path")?;
        let bytes = args.bytes(1, "value")?;
        let offset = args.offset(2)?;
        let max_bytes = args
            .opt_number(3, "maxBytes")?
            .map(|value| script_index("maxBytes", value))
            .transpose()?;
        let ok = bridge.set_data(&path, &bytes, offset, max_bytes).is_ok();
        Ok(Value::new_bool(ctx.clone(), ok))
    })?;

    Ok(ns)
}

fn types_object<'js>(ctx: &Ctx<'js>, types: DataTypes) -> rquickjs::Result<Value<'js>> {
    let object = Object::new(ctx.clone())?;
    object.set("int", types.contains(DataTypes::INT))?;
    object.set("float", types.contains(DataTypes::FLOAT))?;
    object.set("double", types.contains(DataTypes::DOUBLE))?;
    object.set("intArray", types.contains(DataTypes::INT_ARRAY))?;
    object.set("floatArray", types.contains(DataTypes::FLOAT_ARRAY))?;
    object.set("data", types.contains(DataTypes::DATA))?;
    Ok(object.into_value())
}

// ============================================================================
// XPlane.scenery
// ============================================================================

fn scenery_namespace<'js, H: Host + 'static>(
    ctx: &Ctx<'js>,
    bridge: &SharedBridge<H>,
) -> rquickjs::Result<Object<'js>> {
    let ns = Object::new(ctx.clone())?;

    bind(ctx, &ns, bridge, "scenery.loadObject", Sentinel::Null, |ctx, bridge, args| {
        let path = args.string(0, "path")?;
        match bridge.load_object(&path) {
            Ok(handle) => Ok(handle.as_str().into_js(ctx)?),
            Err(_) => Ok(Value::new_null(ctx.clone())),
        }
    })?;

    bind(ctx, &ns, bridge, "scenery.unloadObject", Sentinel::False, |ctx, bridge, args| {
        let handle = ObjectHandle::new(&args.string(0, "handle")?)?;
        Ok(Value::new_bool(ctx.clone(), bridge.unload_object(&handle).is_ok()))
    })?;

    bind(ctx, &ns, bridge, "scenery.createProbe", Sentinel::Null, |ctx, bridge, args| {
        let probe_type = match args.opt_number(0, "type")? {
            None => ProbeType::default(),
            Some(code) => ProbeType::from_code(script_int(code)?)
                .ok_or_else(|| expected("type", "a probe type (0)"))?,
        };
        match bridge.create_probe(probe_type) {
            Ok(handle) => Ok(handle_value(ctx, handle)),
            Err(_) => Ok(Value::new_null(ctx.clone())),
        }
    })?;

    bind(ctx, &ns, bridge, "scenery.destroyProbe", Sentinel::False, |ctx, bridge, args| {
        let handle = args.handle(0, "probe")?;
        Ok(Value::new_bool(ctx.clone(), bridge.destroy_probe(handle).is_ok()))
    })?;

    bind(ctx, &ns, bridge, "scenery.probeTerrain", Sentinel::ProbeError, |ctx, bridge, args| {
        let handle = match args.handle(0, "probe") {
            Ok(handle) => handle,
            Err(err) => {
                bridge.reject("scenery.probeTerrain", err);
                return Ok(probe_miss(ctx, PROBE_INVALID_HANDLE)?);
            }
        };
        // Non-numeric coordinates reach the bridge as NaN and come back as an error miss
        let coordinate = |index| args.number(index, "coordinate").unwrap_or(f64::NAN);
        let result = bridge.probe_terrain(handle, coordinate(1), coordinate(2), coordinate(3));
        Ok(probe_value(ctx, &result)?)
    })?;

    bind(ctx, &ns, bridge, "scenery.getMagneticVariation", Sentinel::Zero, |ctx, bridge, args| {
        let latitude = args.number(0, "latitude")?;
        let longitude = args.number(1, "longitude")?;
        let variation = bridge.magnetic_variation(latitude, longitude).unwrap_or(0.0);
        Ok(Value::new_number(ctx.clone(), variation))
    })?;

    bind(ctx, &ns, bridge, "scenery.degTrueToMagnetic", Sentinel::Zero, |ctx, bridge, args| {
        let heading = args.number(0, "heading")?;
        let magnetic = bridge.deg_true_to_magnetic(heading).unwrap_or(0.0);
        Ok(Value::new_number(ctx.clone(), magnetic))
    })?;

    bind(ctx, &ns, bridge, "scenery.degMagneticToTrue", Sentinel::Zero, |ctx, bridge, args| {
        let heading = args.number(0, "heading")?;
        let heading_true = bridge.deg_magnetic_to_true(heading).unwrap_or(0.0);
        Ok(Value::new_number(ctx.clone(), heading_true))
    })?;

    Ok(ns)
}

fn handle_value<'js, K: ResourceKind>(ctx: &Ctx<'js>, handle: Handle<K>) -> Value<'js> {
    Value::new_number(ctx.clone(), ScriptHandle::from(handle).to_number())
}

fn probe_miss<'js>(ctx: &Ctx<'js>, code: i32) -> rquickjs::Result<Value<'js>> {
    let object = Object::new(ctx.clone())?;
    object.set("hit", false)?;
    object.set("result", code)?;
    Ok(object.into_value())
}

fn probe_value<'js>(ctx: &Ctx<'js>, result: &TerrainProbeResult) -> rquickjs::Result<Value<'js>> {
    let hit = match result {
        TerrainProbeResult::Hit(hit) => hit,
        TerrainProbeResult::Miss { code } => return probe_miss(ctx, *code),
    };
    let object = Object::new(ctx.clone())?;
    object.set("hit", true)?;
    object.set("x", hit.position.x as f64)?;
    object.set("y", hit.position.y as f64)?;
    object.set("z", hit.position.z as f64)?;
    object.set("normalX", hit.normal.x as f64)?;
    object.set("normalY", hit.normal.y as f64)?;
    object.set("normalZ", hit.normal.z as f64)?;
    object.set("velocityX", hit.velocity.x as f64)?;
    object.set("velocityY", hit.velocity.y as f64)?;
    object.set("velocityZ", hit.velocity.z as f64)?;
    object.set("isWet", hit.is_wet)?;
    Ok(object.into_value())
}

// ============================================================================
// XPlane.instance
// ============================================================================

fn instance_namespace<'js, H: Host + 'static>(
    ctx: &Ctx<'js>,
    bridge: &SharedBridge<H>,
) -> rquickjs::Result<Object<'js>> {
    let ns = Object::new(ctx.clone())?;

    bind(ctx, &ns, bridge, "instance.create", Sentinel::Null, |ctx, bridge, args| {
        let object = ObjectHandle::new(&args.string(0, "object")?)?;
        let datarefs = args.strings(1, "datarefs")?;
        match bridge.create_instance(&object, &datarefs) {
            Ok(handle) => Ok(handle_value(ctx, handle)),
            Err(_) => Ok(Value::new_null(ctx.clone())),
        }
    })?;

    bind(ctx, &ns, bridge, "instance.destroy", Sentinel::False, |ctx, bridge, args| {
        let handle = args.handle(0, "instance")?;
        Ok(Value::new_bool(ctx.clone(), bridge.destroy_instance(handle).is_ok()))
    })?;

    bind(ctx, &ns, bridge, "instance.setPosition", Sentinel::False, |ctx, bridge, args| {
        let handle = args.handle(0, "instance")?;
        let position = read_position(&args.object(1, "position")?)?;
        let data: Vec<f32> = args
            .numbers(2, "data")?
            .into_iter()
            .map(|value| value as f32)
            .collect();
        let ok = bridge.set_instance_position(handle, &position, &data).is_ok();
        Ok(Value::new_bool(ctx.clone(), ok))
    })?;

    Ok(ns)
}

/// `{x, y, z, pitch?, heading?, roll?}`. Attitude fields that are not
/// numbers read as 0.
fn read_position(object: &Object<'_>) -> Result<InstancePosition, BridgeError> {
    let field = |name: &str| -> Option<f64> {
        object
            .get::<_, Value>(name)
            .ok()
            .and_then(|value| value.as_number())
    };
    let axis = |name: &'static str| field(name).ok_or_else(|| expected(name, "a number"));

    Ok(InstancePosition::new(axis("x")?, axis("y")?, axis("z")?).with_attitude(
        field("pitch").unwrap_or(0.0),
        field("heading").unwrap_or(0.0),
        field("roll").unwrap_or(0.0),
    ))
}

// ============================================================================
// XPlane.graphics
// ============================================================================

fn graphics_namespace<'js, H: Host + 'static>(
    ctx: &Ctx<'js>,
    bridge: &SharedBridge<H>,
) -> rquickjs::Result<Object<'js>> {
    let ns = Object::new(ctx.clone())?;

    bind(ctx, &ns, bridge, "graphics.localToWorld", Sentinel::Null, |ctx, bridge, args| {
        let local = LocalCoordinates::new(
            args.number(0, "x")?,
            args.number(1, "y")?,
            args.number(2, "z")?,
        );
        let Ok(world) = bridge.local_to_world(local) else {
            return Ok(Value::new_null(ctx.clone()));
        };
        let object = Object::new(ctx.clone())?;
        object.set("latitude", world.latitude)?;
        object.set("longitude", world.longitude)?;
        object.set("altitude", world.altitude)?;
        Ok(object.into_value())
    })?;

    bind(ctx, &ns, bridge, "graphics.worldToLocal", Sentinel::Null, |ctx, bridge, args| {
        let world = WorldCoordinates::new(
            args.number(0, "latitude")?,
            args.number(1, "longitude")?,
            args.number(2, "altitude")?,
        );
        let Ok(local) = bridge.world_to_local(world) else {
            return Ok(Value::new_null(ctx.clone()));
        };
        let object = Object::new(ctx.clone())?;
        object.set("x", local.x)?;
        object.set("y", local.y)?;
        object.set("z", local.z)?;
        Ok(object.into_value())
    })?;

    Ok(ns)
}
