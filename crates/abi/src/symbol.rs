//! Names of the host symbols the extension resolves.

pub const REGISTER_COMMAND: &str = "CommandRegistry::registerCommand";
pub const REGISTER_ALIAS: &str = "CommandRegistry::registerAlias";
pub const FIND_COMMAND: &str = "CommandRegistry::findCommand";
pub const REGISTER_OVERLOAD_INTERNAL: &str = "CommandRegistry::registerOverloadInternal";
pub const ADD_ENUM_VALUES: &str = "?addEnumValues@CommandRegistry@@QEAAHAEBV?$basic_string@DU?$char_traits@D@std@@V?$allocator@D@2@@std@@AEBV?$vector@V?$basic_string@DU?$char_traits@D@std@@V?$allocator@D@2@@std@@V?$allocator@V?$basic_string@DU?$char_traits@D@std@@V?$allocator@D@2@@std@@@2@@3@@Z";
pub const ADD_SOFT_ENUM: &str = "CommandRegistry::addSoftEnum";
pub const UPDATE_SOFT_ENUM: &str = "CommandSoftEnumRegistry::updateSoftEnum";

pub const SELECTOR_CTOR: &str = "CommandSelectorBase::CommandSelectorBase";
pub const SELECTOR_DTOR: &str = "CommandSelectorBase::~CommandSelectorBase";
pub const SELECTOR_NEW_RESULTS: &str = "CommandSelectorBase::newResults";
pub const SELECTOR_GET_NAME: &str = "CommandSelectorBase::getName";
pub const IS_WILDCARD: &str = "?isWildcard@Command@@KA_NAEBVCommandSelectorBase@@@Z";

pub const OUTPUT_SUCCESS_NO_MESSAGE: &str = "?success@CommandOutput@@QEAAXXZ";
pub const OUTPUT_SUCCESS: &str = "?success@CommandOutput@@QEAAXAEBV?$basic_string@DU?$char_traits@D@std@@V?$allocator@D@2@@std@@AEBV?$vector@VCommandOutputParameter@@V?$allocator@VCommandOutputParameter@@@std@@@3@@Z";
pub const OUTPUT_ERROR: &str = "?error@CommandOutput@@QEAAXAEBV?$basic_string@DU?$char_traits@D@std@@V?$allocator@D@2@@std@@AEBV?$vector@VCommandOutputParameter@@V?$allocator@VCommandOutputParameter@@@std@@@3@@Z";
pub const OUTPUT_ADD_MESSAGE: &str = "CommandOutput::addMessage";
pub const OUTPUT_GET_SUCCESS_COUNT: &str = "CommandOutput::getSuccessCount";
pub const OUTPUT_GET_TYPE: &str = "CommandOutput::getType";
pub const OUTPUT_EMPTY: &str = "CommandOutput::empty";

pub const ACTOR_GET_NAME: &str = "Actor::getName";
pub const ACTOR_GET_ENTITY_TYPE_ID: &str = "Actor::getEntityTypeId";
pub const JSON_VALUE_DTOR: &str = "Json::Value::~Value";

pub const TYPEID_COUNTER: &str = "typeid_t<CommandRegistry>::count";
pub const ENUM_PARSER: &str = "CommandRegistry::parseEnum<int,CommandRegistry::DefaultIdConverter<int> >";

pub const MALLOC: &str = "malloc";
pub const FREE: &str = "free";

/// `CommandRegistry::parse<T>` for a C++ type name.
pub fn parser(cxx_type: &str) -> String {
	format!("CommandRegistry::parse<{cxx_type}>")
}

/// `type_id<CommandRegistry,T>`, a function returning the id.
pub fn type_id_fn(cxx_type: &str) -> String {
	format!("type_id<CommandRegistry,{cxx_type}>")
}

/// The static id `type_id<CommandRegistry,T>` caches, for types whose
/// function was inlined away.
pub fn type_id_static(cxx_type: &str) -> String {
	format!("type_id<CommandRegistry,{cxx_type}>::id")
}
